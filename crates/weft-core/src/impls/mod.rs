//! Impls - Executor port の実装
//!
//! # 含まれる実装
//! - **DirectExecutor**: 呼び出しスレッドで同期実行（テスト・決定的実行用）
//! - **ThreadPerTaskExecutor**: 1 job = 1 スレッド
//! - **ThreadPoolExecutor**: 固定ワーカー + バックログ（飽和時は拒否）
//! - **TokioExecutor**: tokio の blocking pool

pub mod direct;
pub mod thread_per_task;
pub mod thread_pool;
pub mod tokio_executor;

// 主要な型を再エクスポート
pub use self::direct::DirectExecutor;
pub use self::thread_per_task::ThreadPerTaskExecutor;
pub use self::thread_pool::{PoolError, ThreadPoolExecutor};
pub use self::tokio_executor::TokioExecutor;
