//! TaskHandle - 1 回の submit の結果を追跡する
//!
//! # 状態遷移
//! - Pending -> Running -> Completed | Failed | Cancelled
//! - Pending -> Cancelled（本体は実行されない）
//!
//! 終端遷移は 1 回だけ、`Monitor` のロック下で状態と payload を同時に書きます。
//! 終端遷移を行ったスレッドがロックを手放したあとで completion queue に
//! handle を積むので、queue から取り出した consumer は必ず一貫した結果を見ます。

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::monitor::{Monitor, deadline_after};
use super::queue::CompletionQueue;
use super::task::CancelSignal;
use crate::domain::{BoxError, StateError, TaskError, TaskId, TaskState};

enum Phase<V, E> {
    Pending,
    Running,
    Done(Outcome<V, E>),
}

enum Outcome<V, E> {
    Completed(V),
    Failed(Arc<E>),
    Panicked(Arc<str>),
    Cancelled,
}

impl<V, E> Outcome<V, E> {
    fn state(&self) -> TaskState {
        match self {
            Outcome::Completed(_) => TaskState::Completed,
            Outcome::Failed(_) | Outcome::Panicked(_) => TaskState::Failed,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }

    fn read(&self) -> Result<V, TaskError<E>>
    where
        V: Clone,
    {
        match self {
            Outcome::Completed(value) => Ok(value.clone()),
            Outcome::Failed(cause) => Err(TaskError::Failed(Arc::clone(cause))),
            Outcome::Panicked(message) => Err(TaskError::Panicked(Arc::clone(message))),
            Outcome::Cancelled => Err(TaskError::Cancelled),
        }
    }
}

impl<V, E> Phase<V, E> {
    fn state(&self) -> TaskState {
        match self {
            Phase::Pending => TaskState::Pending,
            Phase::Running => TaskState::Running,
            Phase::Done(outcome) => outcome.state(),
        }
    }
}

/// 1 回の submit を表す handle
///
/// `CompletionService` が作って `Arc` で返します。producer と、queue から
/// 取り出した consumer の両方が同じ handle を参照します。
///
/// 取り出されないまま失敗した task は、誰にもエラーが届かないまま queue に
/// 残ります（これは呼び出し側のリソースリークで、framework のエラーではありません）。
pub struct TaskHandle<V, E = BoxError> {
    id: TaskId,
    submitted_at: DateTime<Utc>,
    slot: Monitor<Phase<V, E>>,
    cancel: CancelSignal,
    completion_seq: OnceLock<u64>,
    queue: Weak<CompletionQueue<V, E>>,
    me: Weak<TaskHandle<V, E>>,
}

impl<V, E> TaskHandle<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    /// 終端遷移時に `queue` へ自分を積む handle を作る
    pub(crate) fn new(
        id: TaskId,
        submitted_at: DateTime<Utc>,
        queue: Weak<CompletionQueue<V, E>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id,
            submitted_at,
            slot: Monitor::new(Phase::Pending),
            cancel: CancelSignal::default(),
            completion_seq: OnceLock::new(),
            queue,
            me: me.clone(),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn state(&self) -> TaskState {
        self.slot.lock().state()
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == TaskState::Cancelled
    }

    /// 完了順での位置。queue に積まれるまでは `None`。
    pub fn completion_seq(&self) -> Option<u64> {
        self.completion_seq.get().copied()
    }

    /// Pending -> Running。既にキャンセル（または終端）なら `false` で、本体は実行しない。
    pub(crate) fn begin(&self) -> bool {
        let mut phase = self.slot.lock();
        match *phase {
            Phase::Pending => {
                *phase = Phase::Running;
                tracing::trace!(task_id = %self.id, "task started");
                true
            }
            _ => false,
        }
    }

    /// 値を確定させる。終端状態なら `StateError` で、既存の結果は上書きしない。
    pub fn complete(&self, value: V) -> Result<(), StateError> {
        self.settle(Outcome::Completed(value))
    }

    /// 本体が返したエラーを確定させる
    pub fn fail(&self, cause: E) -> Result<(), StateError> {
        self.settle(Outcome::Failed(Arc::new(cause)))
    }

    pub(crate) fn fail_panicked(&self, payload: Box<dyn Any + Send>) -> Result<(), StateError> {
        self.settle(Outcome::Panicked(panic_message(payload.as_ref()).into()))
    }

    /// 終端でなければ Cancelled にして `true`。
    ///
    /// 実行中の本体を止めはしません。`submit_cancellable` で渡した
    /// `CancelSignal` が立つので、本体が協調的に見て止まることはできます。
    /// いずれにせよ、この handle から値が読めることはもうありません。
    pub fn cancel(&self) -> bool {
        let cancelled = self.settle(Outcome::Cancelled).is_ok();
        if cancelled {
            self.cancel.trip();
        }
        cancelled
    }

    pub(crate) fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// 終端状態になるまで待って結果を返す。
    ///
    /// 待っている間に呼び出しスレッドが割り込まれると `TaskError::Interrupted`。
    pub fn get(&self) -> Result<V, TaskError<E>>
    where
        V: Clone,
    {
        self.wait(None)
    }

    /// `get` の時間制限つき版。時間切れは `TaskError::Timeout`。
    pub fn get_timeout(&self, timeout: Duration) -> Result<V, TaskError<E>>
    where
        V: Clone,
    {
        self.wait(deadline_after(timeout))
    }

    /// 待たずに読む。終端状態でなければ `None`。
    pub fn try_get(&self) -> Option<Result<V, TaskError<E>>>
    where
        V: Clone,
    {
        match &*self.slot.lock() {
            Phase::Done(outcome) => Some(outcome.read()),
            _ => None,
        }
    }

    fn wait(&self, deadline: Option<std::time::Instant>) -> Result<V, TaskError<E>>
    where
        V: Clone,
    {
        let read = self.slot.wait_for(deadline, |phase| match phase {
            Phase::Done(outcome) => Some(outcome.read()),
            _ => None,
        })?;
        read.unwrap_or(Err(TaskError::Timeout))
    }

    fn settle(&self, outcome: Outcome<V, E>) -> Result<(), StateError> {
        let state = outcome.state();
        {
            let mut phase = self.slot.lock();
            if let Phase::Done(done) = &*phase {
                return Err(StateError::AlreadyTerminal {
                    id: self.id,
                    state: done.state(),
                });
            }
            *phase = Phase::Done(outcome);
            self.slot.notify_all();
        }
        tracing::debug!(task_id = %self.id, %state, "task settled");
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        // service が既に drop されていれば積む先がない
        if let (Some(queue), Some(me)) = (self.queue.upgrade(), self.me.upgrade()) {
            queue.offer(me);
        }
    }

    pub(crate) fn mark_queued(&self, seq: u64) -> bool {
        self.completion_seq.set(seq).is_ok()
    }
}

impl<V, E> fmt::Debug for TaskHandle<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("state", &self.slot.lock().state())
            .field("completion_seq", &self.completion_seq.get())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::thread;
    use ulid::Ulid;

    type Handle = TaskHandle<u32, String>;

    fn detached() -> Arc<Handle> {
        TaskHandle::new(TaskId::from_ulid(Ulid::new()), Utc::now(), Weak::new())
    }

    #[test]
    fn new_handle_is_pending() {
        let handle = detached();
        assert_eq!(handle.state(), TaskState::Pending);
        assert!(!handle.is_done());
        assert!(handle.try_get().is_none());
        assert_eq!(handle.completion_seq(), None);
    }

    #[test]
    fn complete_then_read() {
        let handle = detached();
        assert!(handle.begin());
        assert_eq!(handle.state(), TaskState::Running);
        handle.complete(42).unwrap();
        assert_eq!(handle.state(), TaskState::Completed);
        assert_eq!(handle.get().unwrap(), 42);
        assert_eq!(handle.try_get().unwrap().unwrap(), 42);
    }

    #[test]
    fn failure_is_surfaced_as_is() {
        let handle = detached();
        handle.begin();
        handle.fail("disk on fire".to_string()).unwrap();

        let err = handle.get().unwrap_err();
        assert_eq!(err.failure().map(|c| c.as_str()), Some("disk on fire"));
        assert_eq!(handle.state(), TaskState::Failed);
    }

    #[rstest]
    #[case::after_complete(Outcome::Completed(1))]
    #[case::after_fail(Outcome::Failed(Arc::new("x".to_string())))]
    #[case::after_cancel(Outcome::Cancelled)]
    fn second_terminal_transition_is_rejected(#[case] first: Outcome<u32, String>) {
        let handle = detached();
        let first_state = first.state();
        handle.settle(first).unwrap();

        let err = handle.complete(99).unwrap_err();
        assert_eq!(
            err,
            StateError::AlreadyTerminal {
                id: handle.id(),
                state: first_state,
            }
        );
        assert!(handle.fail("late".to_string()).is_err());
        assert!(!handle.cancel());
        assert_eq!(handle.state(), first_state);
    }

    #[test]
    fn cancel_before_start_prevents_begin() {
        let handle = detached();
        assert!(handle.cancel());
        assert!(!handle.begin());
        assert!(handle.is_cancelled());
        assert!(handle.cancel_signal().is_cancelled());
        assert!(handle.get().unwrap_err().is_cancelled());
    }

    #[test]
    fn cancel_while_running_discards_the_late_value() {
        let handle = detached();
        assert!(handle.begin());
        assert!(handle.cancel());
        assert!(handle.complete(5).is_err());
        assert!(handle.get().unwrap_err().is_cancelled());
    }

    #[test]
    fn panic_payload_becomes_failure_message() {
        let handle = detached();
        handle.begin();
        handle.fail_panicked(Box::new("kaboom")).unwrap();
        match handle.get() {
            Err(TaskError::Panicked(msg)) => assert_eq!(&*msg, "kaboom"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn get_timeout_reports_timeout_and_leaves_state_alone() {
        let handle = detached();
        let start = std::time::Instant::now();
        let err = handle.get_timeout(Duration::from_millis(30)).unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(handle.state(), TaskState::Pending);
    }

    #[test]
    fn get_blocks_until_another_thread_completes() {
        let handle = detached();
        let completer = {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                handle.begin();
                handle.complete(7).unwrap();
            })
        };
        assert_eq!(handle.get().unwrap(), 7);
        completer.join().unwrap();
    }

    #[test]
    fn interrupted_get_leaves_handle_pending() {
        let handle = detached();
        let (tx, rx) = std::sync::mpsc::channel();
        let reader = {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                tx.send(crate::completion::interrupt::current()).unwrap();
                handle.get()
            })
        };
        rx.recv().unwrap().interrupt();
        let result = reader.join().unwrap();
        assert!(matches!(result, Err(TaskError::Interrupted(_))));
        assert_eq!(handle.state(), TaskState::Pending);
    }

    #[test]
    fn interrupted_get_timeout_returns_before_the_deadline() {
        let handle = detached();
        let (tx, rx) = std::sync::mpsc::channel();
        let reader = {
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                tx.send(crate::completion::interrupt::current()).unwrap();
                let start = std::time::Instant::now();
                (handle.get_timeout(Duration::from_secs(5)), start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        rx.recv().unwrap().interrupt();

        let (result, waited) = reader.join().unwrap();
        assert!(matches!(result, Err(TaskError::Interrupted(_))));
        assert!(waited < Duration::from_secs(5));
        assert_eq!(handle.state(), TaskState::Pending);

        handle.begin();
        handle.complete(8).unwrap();
        assert_eq!(handle.get_timeout(Duration::from_secs(1)).unwrap(), 8);
    }
}
