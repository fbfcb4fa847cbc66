//! Monitor - Mutex + Condvar の組
//!
//! queue・handle・thread pool の待機はすべてここを通ります。
//!
//! # 学習ポイント
//! - 起床のたびに条件を再確認する（spurious wakeup は呼び出し側に見せない）
//! - 残り時間は起床のたびに deadline から計算し直す
//! - 待機中は呼び出しスレッドの `Interrupt` に自分を登録する
//! - ロック中にユーザーコードを走らせないので、poison は無視して中身を使う

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::interrupt::{self, Wake};
use crate::domain::Interrupted;

pub(crate) struct Monitor<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    state: Mutex<T>,
    cond: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send> Wake for Shared<T> {
    fn wake(&self) {
        // ロックを取ってから notify: 待機者はフラグ確認から wait 開始までロックを握っている
        let _guard = self.lock();
        self.cond.notify_all();
    }
}

impl<T> Monitor<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(value),
                cond: Condvar::new(),
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.shared.lock()
    }

    pub(crate) fn notify_one(&self) {
        self.shared.cond.notify_one();
    }

    pub(crate) fn notify_all(&self) {
        self.shared.cond.notify_all();
    }
}

impl<T: Send + 'static> Monitor<T> {
    /// `ready` が `Some` を返すまで待つ。
    ///
    /// - `deadline` が `None` なら無期限
    /// - deadline を過ぎたら `Ok(None)`
    /// - 待っている間に割り込まれたら `Err(Interrupted)`（フラグは消費される）
    ///
    /// `ready` は最初に一度、ロックを取った直後に評価されるので、
    /// 既に条件を満たしていれば割り込みフラグを見ずに返ります。
    pub(crate) fn wait_for<R>(
        &self,
        deadline: Option<Instant>,
        mut ready: impl FnMut(&mut T) -> Option<R>,
    ) -> Result<Option<R>, Interrupted> {
        let interrupt = interrupt::current();
        let _registration = interrupt.register(self.shared.clone());

        let mut guard = self.shared.lock();
        loop {
            if let Some(value) = ready(&mut guard) {
                return Ok(Some(value));
            }
            if interrupt.take() {
                return Err(Interrupted);
            }
            guard = match deadline {
                None => self
                    .shared
                    .cond
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    let (guard, _timed_out) = self
                        .shared
                        .cond
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    guard
                }
            };
        }
    }
}

/// `timeout` 後の deadline。表現できないほど遠ければ無期限扱い。
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}
