//! Task 本体と、handle を終端状態まで運ぶ実行ラッパー
//!
//! 値を返す task と副作用だけの task は、submit 時点で `TaskBody` の
//! variant に分けておき、実行時には「走らせて `Result<V, E>` を得る」
//! という 1 つの形に揃えます。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use super::handle::TaskHandle;
use crate::ports::Job;

/// 協調的キャンセルの合図
///
/// `submit_cancellable` で渡された本体が、自分で見て早めに切り上げるためのもの。
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn trip(&self) {
        self.0.store(true, Ordering::Release);
    }
}

pub(crate) enum TaskBody<V, E> {
    /// 値を返すか、失敗する
    Value(Box<dyn FnOnce() -> Result<V, E> + Send>),

    /// 副作用だけ。成功時の値は submit 時に渡された `result`
    Effect {
        run: Box<dyn FnOnce() -> Result<(), E> + Send>,
        result: V,
    },

    /// 値を返す。実行中に `CancelSignal` を見てもよい
    Cancellable(Box<dyn FnOnce(&CancelSignal) -> Result<V, E> + Send>),
}

impl<V, E> TaskBody<V, E> {
    fn run(self, signal: &CancelSignal) -> Result<V, E> {
        match self {
            TaskBody::Value(run) => run(),
            TaskBody::Effect { run, result } => run().map(|()| result),
            TaskBody::Cancellable(run) => run(signal),
        }
    }
}

const SUBMITTING: u8 = 0;
const ACCEPTED: u8 = 1;
const REJECTED: u8 = 2;
const DROPPED_EARLY: u8 = 3;

/// Executor が Job を受け付けたかどうか
///
/// `execute` が返る前に Job が drop されることがある（拒否のとき、または
/// 受け付けたうえで捨てたとき）。どちらだったかは `execute` の戻り値を見るまで
/// 分からないので、その間の drop はここに記録だけして、判断は submit 側に任せる。
#[derive(Clone)]
pub(crate) struct Admission(Arc<AtomicU8>);

impl Admission {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(SUBMITTING)))
    }

    /// 受け付けられた。Job が既に実行されずに drop されていれば `false`。
    pub(crate) fn accept(&self) -> bool {
        self.0
            .compare_exchange(SUBMITTING, ACCEPTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 拒否された。以後 Job が drop されても handle には触らない。
    pub(crate) fn reject(&self) {
        self.0.store(REJECTED, Ordering::Release);
    }

    /// Job の drop 時に呼ぶ。handle をここで終端にすべきなら `true`。
    fn on_drop(&self) -> bool {
        match self.0.compare_exchange(SUBMITTING, DROPPED_EARLY, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => false,
            Err(current) => current == ACCEPTED,
        }
    }
}

/// 実行されないまま drop された Job の handle を Cancelled にする
///
/// runtime の停止や、`shutdown_now` で取り出した Job の放置で本体が走らなくても、
/// handle は queue に届く。拒否された Job では何もしない。
struct Unstarted<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    handle: Option<Arc<TaskHandle<V, E>>>,
    admission: Admission,
}

impl<V, E> Unstarted<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    fn start(mut self) -> Option<Arc<TaskHandle<V, E>>> {
        self.handle.take()
    }
}

impl<V, E> Drop for Unstarted<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take()
            && self.admission.on_drop()
        {
            abandon(&handle);
        }
    }
}

/// 受け付け済みなのに走らなかった task を Cancelled にする
pub(crate) fn abandon<V, E>(handle: &TaskHandle<V, E>)
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    if handle.cancel() {
        tracing::warn!(task_id = %handle.id(), "job dropped by executor before running");
    }
}

/// 本体と handle を 1 つの `Job` にまとめる
///
/// - handle が既にキャンセルされていれば本体は呼ばない
/// - panic も捕まえて Failed にする（consumer が永遠に待たないように）
/// - 実行中にキャンセルされた場合、終端遷移は失敗し、得られた値は捨てる
/// - 受け付けられた Job が実行されずに drop されたら handle は Cancelled になる
///
/// 返り値の `Admission` には `execute` の結果を必ず伝えること。
pub(crate) fn into_job<V, E>(body: TaskBody<V, E>, handle: Arc<TaskHandle<V, E>>) -> (Job, Admission)
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    let admission = Admission::new();
    let guard = Unstarted {
        handle: Some(handle),
        admission: admission.clone(),
    };
    let job: Job = Box::new(move || {
        let Some(handle) = guard.start() else {
            return;
        };
        if !handle.begin() {
            tracing::debug!(task_id = %handle.id(), "skipping cancelled task");
            return;
        }

        let signal = handle.cancel_signal();
        let settled = match panic::catch_unwind(AssertUnwindSafe(|| body.run(&signal))) {
            Ok(Ok(value)) => handle.complete(value),
            Ok(Err(cause)) => handle.fail(cause),
            Err(payload) => {
                tracing::warn!(task_id = %handle.id(), "task body panicked");
                handle.fail_panicked(payload)
            }
        };

        if let Err(err) = settled {
            tracing::debug!(task_id = %handle.id(), error = %err, "discarding result of finished task");
        }
    });
    (job, admission)
}
