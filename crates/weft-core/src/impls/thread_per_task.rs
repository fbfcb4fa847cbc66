//! ThreadPerTaskExecutor - 1 job ごとに OS スレッドを立てる

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::RejectedError;
use crate::ports::{Executor, Job};

pub struct ThreadPerTaskExecutor {
    name: String,
    spawned: AtomicU64,
}

impl ThreadPerTaskExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spawned: AtomicU64::new(0),
        }
    }

    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Default for ThreadPerTaskExecutor {
    fn default() -> Self {
        Self::new("weft-task")
    }
}

impl Executor for ThreadPerTaskExecutor {
    /// スレッドを作れなかった場合は拒否として扱う
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        std::thread::Builder::new()
            .name(format!("{}-{n}", self.name))
            .spawn(job)
            .map(drop)
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to spawn task thread");
                RejectedError::Other(format!("thread spawn failed: {e}"))
            })
    }
}
