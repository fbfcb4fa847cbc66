//! TokioExecutor - tokio の blocking pool で Job を実行する
//!
//! # 学習ポイント
//! - 本体は同期関数なので `spawn` ではなく `spawn_blocking` を使う
//! - runtime の外からでも `Handle` さえあれば submit できる

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;

use crate::domain::RejectedError;
use crate::ports::{Executor, Job};

pub struct TokioExecutor {
    handle: Handle,
    closed: AtomicBool,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            closed: AtomicBool::new(false),
        }
    }

    /// 現在の runtime の中から作る。runtime の外なら `None`。
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// 以降の submit を拒否する（実行中・待機中の Job はそのまま走る）
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        if self.is_closed() {
            return Err(RejectedError::Shutdown);
        }
        // JoinHandle を捨てても Job は走り続ける。runtime が既に止まっていれば
        // Job はその場で drop され、handle は Cancelled として queue に届く
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn runs_jobs_on_the_blocking_pool() {
        let executor = TokioExecutor::try_current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        executor
            .execute(Box::new(move || {
                tx.send(42).unwrap();
            }))
            .unwrap();
        let got = tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap();
        assert_eq!(got.unwrap(), 42);
    }

    #[tokio::test]
    async fn closed_executor_rejects() {
        let executor = TokioExecutor::try_current().unwrap();
        executor.close();
        assert_eq!(
            executor.execute(Box::new(|| {})).unwrap_err(),
            RejectedError::Shutdown
        );
    }

    #[test]
    fn outside_a_runtime_there_is_no_current_handle() {
        assert!(TokioExecutor::try_current().is_none());
    }
}
