//! CompletionService - submit と「完了した結果の消費」を切り離すサービス
//!
//! # フロー
//! 1. `submit*` が本体を `TaskBody` に包み、`TaskHandle` を作る
//! 2. handle + 本体を 1 つの `Job` にして `Executor` に渡す（拒否されたらそのままエラー）
//! 3. 本体が終わると、終端遷移を行ったスレッドが handle を `CompletionQueue` に積む
//! 4. consumer は `take` / `poll` で完了順に handle を受け取り、結果を読む
//!
//! # メモリ可視性
//! - submit 前に呼び出し側が書いたもの → 本体から見える（Executor への受け渡しが同期点）
//! - 本体が完了前に書いたもの → `take` / `poll` で handle を受け取った consumer から見える
//!   （handle のロック → queue のロック、の順に解放と獲得が連なる）

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::handle::TaskHandle;
use super::queue::CompletionQueue;
use super::task::{self, CancelSignal, TaskBody};
use crate::app::ServiceBuilder;
use crate::domain::{BoxError, Interrupted, RejectedError};
use crate::observability::ServiceStats;
use crate::ports::{Clock, Executor, IdGenerator, SystemClock, UlidGenerator};

/// 完了順に結果を受け渡すサービス
///
/// # 使用例
/// ```ignore
/// let service = CompletionService::<u32>::new(ThreadPoolExecutor::new(PoolConfig::default())?);
/// for i in 0..3 {
///     service.submit(move || Ok(i))?;
/// }
/// while let Some(handle) = service.poll_timeout(Duration::from_secs(1))? {
///     println!("{} -> {:?}", handle.id(), handle.get());
/// }
/// ```
pub struct CompletionService<V, E = BoxError> {
    executor: Arc<dyn Executor>,
    queue: Arc<CompletionQueue<V, E>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    submitted: AtomicU64,
    rejected: AtomicU64,
}

impl<V, E> CompletionService<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    /// 既定の Clock / IdGenerator で作る
    pub fn new(executor: impl Executor + 'static) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::from_parts(Arc::new(executor), clock, ids)
    }

    pub fn builder() -> ServiceBuilder<V, E> {
        ServiceBuilder::new()
    }

    pub(crate) fn from_parts(
        executor: Arc<dyn Executor>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            executor,
            queue: Arc::new(CompletionQueue::new()),
            clock,
            ids,
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// 値を返す task を submit する
    ///
    /// すぐに handle を返します（実行完了は待たない）。Executor が拒否した場合は
    /// `RejectedError` で、handle は作られず queue にも何も現れません。
    pub fn submit<F>(&self, task: F) -> Result<Arc<TaskHandle<V, E>>, RejectedError>
    where
        F: FnOnce() -> Result<V, E> + Send + 'static,
    {
        self.dispatch(TaskBody::Value(Box::new(task)))
    }

    /// 値を返さない task を submit する。成功時の値は `result`。
    pub fn submit_effect<F>(&self, task: F, result: V) -> Result<Arc<TaskHandle<V, E>>, RejectedError>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        self.dispatch(TaskBody::Effect {
            run: Box::new(task),
            result,
        })
    }

    /// `CancelSignal` を見ながら走る task を submit する
    pub fn submit_cancellable<F>(&self, task: F) -> Result<Arc<TaskHandle<V, E>>, RejectedError>
    where
        F: FnOnce(&CancelSignal) -> Result<V, E> + Send + 'static,
    {
        self.dispatch(TaskBody::Cancellable(Box::new(task)))
    }

    /// 次に完了した handle を取り出す。なければ待つ。
    pub fn take(&self) -> Result<Arc<TaskHandle<V, E>>, Interrupted> {
        self.queue.take()
    }

    /// 次に完了した handle があれば取り出す。待たない。
    pub fn poll(&self) -> Option<Arc<TaskHandle<V, E>>> {
        self.queue.poll()
    }

    /// `timeout` まで待って次の handle を取り出す
    pub fn poll_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<Arc<TaskHandle<V, E>>>, Interrupted> {
        self.queue.poll_timeout(timeout)
    }

    pub async fn take_async(&self) -> Arc<TaskHandle<V, E>> {
        self.queue.take_async().await
    }

    pub async fn poll_timeout_async(&self, timeout: Duration) -> Option<Arc<TaskHandle<V, E>>> {
        self.queue.poll_timeout_async(timeout).await
    }

    pub fn stats(&self) -> ServiceStats {
        let counts = self.queue.counts();
        ServiceStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: counts.completed,
            failed: counts.failed,
            cancelled: counts.cancelled,
            ready: self.queue.len(),
        }
    }

    fn dispatch(&self, body: TaskBody<V, E>) -> Result<Arc<TaskHandle<V, E>>, RejectedError> {
        let id = self.ids.generate_task_id();
        let handle = TaskHandle::new(id, self.clock.now(), Arc::downgrade(&self.queue));
        let (job, admission) = task::into_job(body, Arc::clone(&handle));

        // 速い Executor では execute が返る前に完了まで進むので、先に数える
        self.submitted.fetch_add(1, Ordering::Relaxed);
        match self.executor.execute(job) {
            Ok(()) => {
                tracing::debug!(task_id = %id, "task submitted");
                if !admission.accept() {
                    task::abandon(&handle);
                }
                Ok(handle)
            }
            Err(err) => {
                admission.reject();
                self.submitted.fetch_sub(1, Ordering::Relaxed);
                self.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(task_id = %id, error = %err, "task rejected by executor");
                Err(err)
            }
        }
    }
}
