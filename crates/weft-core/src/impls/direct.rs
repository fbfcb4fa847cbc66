//! DirectExecutor - 呼び出しスレッドでそのまま実行する
//!
//! Executor は非同期であることを要求しません。テストでは完了順が
//! submit 順と一致する決定的な実行戦略として使えます。

use crate::domain::RejectedError;
use crate::ports::{Executor, Job};

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExecutor;

impl DirectExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for DirectExecutor {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        job();
        Ok(())
    }
}
