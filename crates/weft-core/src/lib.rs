//! weft-core
//!
//! Completion-ordered task execution.
//!
//! task の submit（誰が・どう走らせるか）と、完了した結果の消費（完了した順に受け取る）
//! を切り離すためのライブラリです。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, errors）
//! - **ports**: 抽象化レイヤー（Executor, Clock, IdGenerator）
//! - **completion**: 中核（TaskHandle, CompletionQueue, CompletionService, interrupt）
//! - **impls**: Executor の実装（Direct, ThreadPerTask, ThreadPool, Tokio）
//! - **app**: ServiceBuilder
//! - **config**: ThreadPool の設定
//! - **observability**: ServiceStats

pub mod app;
pub mod completion;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{BuildError, ServiceBuilder};
pub use completion::{
    CancelSignal, CompletionQueue, CompletionService, Interrupt, TaskHandle, interrupt,
};
pub use config::{ConfigError, PoolConfig};
pub use domain::{BoxError, Interrupted, RejectedError, StateError, TaskError, TaskId, TaskState};
pub use observability::ServiceStats;
