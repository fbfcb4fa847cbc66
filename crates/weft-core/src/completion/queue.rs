//! CompletionQueue - 完了順に handle を受け渡すキュー
//!
//! # 学習ポイント
//! - Mutex + Condvar による blocking take（起床のたびに再確認）
//! - `tokio::sync::Notify` による async take（取り出しは同期的に 1 回の poll 内で完結）
//! - 取り出した側がまだ残りを見たら次の待機者を起こす（cascading signal）
//!
//! # 不変条件
//! - 積まれるのは終端状態に達した handle だけ（積むのは handle 自身）
//! - 1 つの handle は高々 1 回だけ積まれ、高々 1 人の consumer にだけ渡る
//! - 容量は無制限。producer 側に背圧はかからない

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use super::handle::TaskHandle;
use super::monitor::{Monitor, deadline_after};
use crate::domain::{BoxError, Interrupted, TaskState};

/// 完了済み handle のキュー
pub struct CompletionQueue<V, E = BoxError> {
    ready: Monitor<Ready<V, E>>,
    notify: Notify,
}

struct Ready<V, E> {
    handles: VecDeque<Arc<TaskHandle<V, E>>>,
    next_seq: u64,
    counts: CompletionCounts,
}

/// 終端状態ごとの累計（queue に積まれた時点で数える）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionCounts {
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl<V, E> CompletionQueue<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            ready: Monitor::new(Ready {
                handles: VecDeque::new(),
                next_seq: 0,
                counts: CompletionCounts::default(),
            }),
            notify: Notify::new(),
        }
    }

    /// 末尾に積む。ブロックせず、失敗もしない。
    pub(crate) fn offer(&self, handle: Arc<TaskHandle<V, E>>) {
        {
            let mut ready = self.ready.lock();
            let seq = ready.next_seq;
            if !handle.mark_queued(seq) {
                tracing::error!(task_id = %handle.id(), "handle offered twice; ignoring");
                return;
            }
            ready.next_seq += 1;
            match handle.state() {
                TaskState::Completed => ready.counts.completed += 1,
                TaskState::Failed => ready.counts.failed += 1,
                TaskState::Cancelled => ready.counts.cancelled += 1,
                TaskState::Pending | TaskState::Running => {
                    debug_assert!(false, "non-terminal handle offered");
                }
            }
            tracing::trace!(task_id = %handle.id(), seq, "handle queued");
            ready.handles.push_back(handle);
            self.ready.notify_one();
        }
        self.notify.notify_one();
    }

    /// 先頭を取り出す。空なら届くまで待つ。
    ///
    /// 待機中に呼び出しスレッドが割り込まれたら `Interrupted`（キューは変化しない）。
    pub fn take(&self) -> Result<Arc<TaskHandle<V, E>>, Interrupted> {
        loop {
            if let Some(taken) = self.ready.wait_for(None, Self::pop_front)? {
                return Ok(self.hand_out(taken));
            }
        }
    }

    /// 先頭があれば取り出す。待たない。
    pub fn poll(&self) -> Option<Arc<TaskHandle<V, E>>> {
        let taken = Self::pop_front(&mut self.ready.lock());
        taken.map(|taken| self.hand_out(taken))
    }

    /// `timeout` まで待って先頭を取り出す。時間切れは `Ok(None)`。
    ///
    /// 時間切れはキューにも handle にも何の変化も残しません。
    pub fn poll_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<Arc<TaskHandle<V, E>>>, Interrupted> {
        let taken = self.ready.wait_for(deadline_after(timeout), Self::pop_front)?;
        Ok(taken.map(|taken| self.hand_out(taken)))
    }

    /// `take` の async 版。drop されても handle を失わない。
    pub async fn take_async(&self) -> Arc<TaskHandle<V, E>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // 再確認より前に登録しておけば、その間の notify_one を取りこぼさない
            notified.as_mut().enable();

            if let Some(handle) = self.poll() {
                return handle;
            }
            notified.await;
        }
    }

    /// `poll_timeout` の async 版
    pub async fn poll_timeout_async(&self, timeout: Duration) -> Option<Arc<TaskHandle<V, E>>> {
        tokio::time::timeout(timeout, self.take_async()).await.ok()
    }

    pub fn len(&self) -> usize {
        self.ready.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> CompletionCounts {
        self.ready.lock().counts
    }

    fn pop_front(ready: &mut Ready<V, E>) -> Option<(Arc<TaskHandle<V, E>>, bool)> {
        let handle = ready.handles.pop_front()?;
        Some((handle, !ready.handles.is_empty()))
    }

    fn hand_out(&self, (handle, more): (Arc<TaskHandle<V, E>>, bool)) -> Arc<TaskHandle<V, E>> {
        if more {
            self.ready.notify_one();
            self.notify.notify_one();
        }
        handle
    }
}

impl<V, E> Default for CompletionQueue<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
