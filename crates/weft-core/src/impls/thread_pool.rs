//! ThreadPoolExecutor - 固定数のワーカースレッド + バックログ
//!
//! # 学習ポイント
//! - バックログは `Monitor<Backlog>`（completion queue と同じ待機の仕組み）
//! - 容量を超えた submit は `RejectedError::Saturated` で即座に拒否（ブロックしない）
//! - `shutdown()` は受付だけ止めてバックログは流し切る、`shutdown_now()` は未実行の Job を返す
//!
//! # 注意
//! `shutdown_now()` で返された Job を実行しないまま捨てると、その Job の
//! TaskHandle は Cancelled として consumer に届きます。

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use thiserror::Error;

use crate::completion::{Monitor, interrupt};
use crate::config::{ConfigError, PoolConfig};
use crate::domain::RejectedError;
use crate::ports::{Executor, Job};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Backlog {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct Shared {
    backlog: Monitor<Backlog>,
    capacity: Option<usize>,
    active: AtomicUsize,
}

pub struct ThreadPoolExecutor {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    config: PoolConfig,
}

impl ThreadPoolExecutor {
    /// 設定を検証してワーカーを起動する
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            backlog: Monitor::new(Backlog {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            capacity: config.queue_capacity,
            active: AtomicUsize::new(0),
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(config.workers)),
            config,
        };

        for index in 0..pool.config.workers {
            let shared = Arc::clone(&pool.shared);
            let spawned = std::thread::Builder::new()
                .name(format!("{}-{index}", pool.config.thread_name))
                .spawn(move || worker_loop(index, &shared));
            match spawned {
                Ok(join) => pool.lock_workers().push(join),
                Err(e) => {
                    // 起動済みのワーカーは drop 時の shutdown で止まる
                    tracing::error!(error = %e, index, "failed to spawn pool worker");
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        tracing::debug!(
            workers = pool.config.workers,
            capacity = ?pool.config.queue_capacity,
            "thread pool started"
        );
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 受付を止める。バックログに残っている Job は最後まで実行される。
    pub fn shutdown(&self) {
        let mut backlog = self.shared.backlog.lock();
        if !backlog.shutdown {
            backlog.shutdown = true;
            tracing::debug!(pending = backlog.jobs.len(), "thread pool shutting down");
        }
        self.shared.backlog.notify_all();
    }

    /// 受付を止め、まだ始まっていない Job を取り出して返す
    pub fn shutdown_now(&self) -> Vec<Job> {
        let mut backlog = self.shared.backlog.lock();
        backlog.shutdown = true;
        let drained: Vec<Job> = backlog.jobs.drain(..).collect();
        self.shared.backlog.notify_all();
        tracing::debug!(drained = drained.len(), "thread pool stopped");
        drained
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.backlog.lock().shutdown
    }

    /// ワーカーの終了を待つ。先に `shutdown` を呼んでおくこと。
    pub fn join(&self) {
        let joins: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        let me = std::thread::current().id();
        for join in joins {
            if join.thread().id() == me {
                continue;
            }
            if join.join().is_err() {
                tracing::error!("pool worker exited by panic");
            }
        }
    }

    /// 実行を待っている Job の数
    pub fn backlog(&self) -> usize {
        self.shared.backlog.lock().jobs.len()
    }

    /// いま Job を実行中のワーカー数
    pub fn active_workers(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        let mut backlog = self.shared.backlog.lock();
        if backlog.shutdown {
            return Err(RejectedError::Shutdown);
        }
        if let Some(capacity) = self.shared.capacity
            && backlog.jobs.len() >= capacity
        {
            return Err(RejectedError::Saturated { capacity });
        }
        backlog.jobs.push_back(job);
        self.shared.backlog.notify_one();
        Ok(())
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, shared: &Shared) {
    tracing::trace!(index, "pool worker started");
    loop {
        let next = shared.backlog.wait_for(None, |backlog| {
            match backlog.jobs.pop_front() {
                Some(job) => Some(Some(job)),
                None if backlog.shutdown => Some(None),
                None => None,
            }
        });

        let job = match next {
            Ok(Some(Some(job))) => job,
            Ok(Some(None)) => break,
            // 誰かがワーカーに割り込んだだけ。フラグは消費済みなので待ち直す
            Ok(None) | Err(_) => continue,
        };

        // 前の Job が残した割り込みを次の Job に持ち越さない
        interrupt::clear();
        shared.active.fetch_add(1, Ordering::AcqRel);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::warn!(index, "job panicked on pool worker");
        }
        shared.active.fetch_sub(1, Ordering::AcqRel);
    }
    tracing::trace!(index, "pool worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn pool(workers: usize, capacity: Option<usize>) -> ThreadPoolExecutor {
        let mut config = PoolConfig::default().with_workers(workers);
        config.queue_capacity = capacity;
        ThreadPoolExecutor::new(config).unwrap()
    }

    #[test]
    fn runs_jobs_on_worker_threads() {
        let pool = pool(2, None);
        let (tx, rx) = mpsc::channel();
        for i in 0..4 {
            let tx = tx.clone();
            pool.execute(Box::new(move || tx.send(i).unwrap())).unwrap();
        }
        let mut got: Vec<i32> = (0..4).map(|_| rx.recv().unwrap()).collect();
        got.sort();
        assert_eq!(got, vec![0, 1, 2, 3]);
        pool.shutdown();
        pool.join();
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        let config = PoolConfig::default().with_workers(0);
        assert!(matches!(
            ThreadPoolExecutor::new(config),
            Err(PoolError::Config(ConfigError::ZeroWorkers))
        ));
    }

    #[test]
    fn rejects_when_backlog_is_full() {
        let pool = pool(1, Some(1));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();

        // ワーカーを塞ぐ
        pool.execute(Box::new(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        }))
        .unwrap();
        started_rx.recv().unwrap();

        pool.execute(Box::new(|| {})).unwrap();
        let err = pool.execute(Box::new(|| {})).unwrap_err();
        assert_eq!(err, RejectedError::Saturated { capacity: 1 });
        assert_eq!(pool.backlog(), 1);
        assert_eq!(pool.active_workers(), 1);

        release_tx.send(()).unwrap();
        pool.shutdown();
        pool.join();
        assert_eq!(pool.backlog(), 0);
    }

    #[test]
    fn shutdown_drains_then_rejects() {
        let pool = pool(1, None);
        let (tx, rx) = mpsc::channel();
        for i in 0..3 {
            let tx = tx.clone();
            pool.execute(Box::new(move || {
                std::thread::sleep(Duration::from_millis(5));
                tx.send(i).unwrap();
            }))
            .unwrap();
        }
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert_eq!(pool.execute(Box::new(|| {})).unwrap_err(), RejectedError::Shutdown);

        pool.join();
        let got: Vec<i32> = rx.try_iter().collect();
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[test]
    fn shutdown_now_returns_unstarted_jobs() {
        let pool = pool(1, None);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        pool.execute(Box::new(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        }))
        .unwrap();
        started_rx.recv().unwrap();

        pool.execute(Box::new(|| {})).unwrap();
        pool.execute(Box::new(|| {})).unwrap();

        let pending = pool.shutdown_now();
        assert_eq!(pending.len(), 2);
        release_tx.send(()).unwrap();
        pool.join();
    }

    fn explode() {
        panic!("job blew up");
    }

    #[test]
    fn panicking_job_does_not_kill_the_worker() {
        let pool = pool(1, None);
        pool.execute(Box::new(explode)).unwrap();

        let (tx, rx) = mpsc::channel();
        pool.execute(Box::new(move || tx.send(()).unwrap())).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.shutdown();
        pool.join();
    }
}
