//! Completion - 完了順に結果を受け渡す中核部分
//!
//! # 構成
//! - **handle**: `TaskHandle`（1 回の submit の状態と結果）
//! - **queue**: `CompletionQueue`（終端に達した handle を完了順に保持）
//! - **service**: `CompletionService`（submit → Executor → queue の配線）
//! - **interrupt**: blocking wait を中断するためのスレッド単位のフラグ
//! - **task**: 本体の形（値 / 副作用 / 協調キャンセル）と実行ラッパー
//! - **monitor**: 上記すべてが使う Mutex + Condvar

mod handle;
pub mod interrupt;
mod monitor;
mod queue;
mod service;
mod task;

pub(crate) use self::monitor::Monitor;

pub use self::handle::TaskHandle;
pub use self::interrupt::Interrupt;
pub use self::queue::{CompletionCounts, CompletionQueue};
pub use self::service::CompletionService;
pub use self::task::CancelSignal;
