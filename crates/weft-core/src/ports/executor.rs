//! Executor port - task をどう走らせるかの抽象化
//!
//! CompletionService は「誰が・どのスレッドで」走らせるかを知りません。
//! ここで受け取るのは型消去された `Job` だけで、結果の受け渡しは
//! Job の中に閉じ込めた TaskHandle が担当します。
//!
//! # 実装
//! - `impls::DirectExecutor`: 呼び出しスレッドでそのまま実行
//! - `impls::ThreadPerTaskExecutor`: 1 job = 1 スレッド
//! - `impls::ThreadPoolExecutor`: 固定ワーカー + バックログ
//! - `impls::TokioExecutor`: tokio の blocking pool

use std::sync::Arc;

use crate::domain::RejectedError;

/// 型消去された実行単位
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executor は Job を（たいていは非同期に）実行する
///
/// # 契約
/// - `Ok(())` を返したら、その Job は最終的に 1 回だけ実行されるか、実行されずに drop されること
/// - `Err` を返したら Job は実行されずに drop されること
/// - `execute` は他の task の完了を待ってブロックしないこと
///
/// 受け付けた Job が実行されずに drop された場合（runtime の停止、
/// `shutdown_now` で取り出したまま放置するなど）、その handle は Cancelled
/// として completion queue に届きます。
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job) -> Result<(), RejectedError>;
}

impl<X: Executor + ?Sized> Executor for Arc<X> {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        (**self).execute(job)
    }
}

impl<X: Executor + ?Sized> Executor for Box<X> {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        (**self).execute(job)
    }
}
