//! Interrupt - スレッド単位の協調的な割り込み
//!
//! Rust のスレッドには組み込みの interrupt がないので、スレッドごとに
//! フラグを 1 つ持たせ、blocking wait（`take` / `poll_timeout` / `TaskHandle::get`）
//! がそれを観測するようにします。
//!
//! # 使用例
//! ```ignore
//! let (tx, rx) = std::sync::mpsc::channel();
//! let consumer = std::thread::spawn(move || {
//!     tx.send(interrupt::current()).unwrap();
//!     service.take() // -> Err(Interrupted)
//! });
//! rx.recv().unwrap().interrupt();
//! ```
//!
//! # 規則
//! - `interrupt()` はフラグを立ててから、そのスレッドが待機中の monitor を起こす
//! - wait が `Interrupted` を返すときにフラグは消費される（1 回の割り込みで 1 回中断）
//! - 待たずに済んだ呼び出し（データが既にある）はフラグに触れない

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

thread_local! {
    static CURRENT: Interrupt = Interrupt::new();
}

/// 割り込まれたときに待機者を起こす相手
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

/// あるスレッドの割り込みフラグへのハンドル
///
/// `Clone` して別スレッドに渡し、そちらから `interrupt()` を呼びます。
#[derive(Clone)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

struct Inner {
    flag: AtomicBool,
    wakers: Mutex<Wakers>,
}

#[derive(Default)]
struct Wakers {
    next_key: u64,
    entries: Vec<(u64, Arc<dyn Wake>)>,
}

/// 呼び出しスレッドの割り込みハンドル
pub fn current() -> Interrupt {
    CURRENT.with(Interrupt::clone)
}

/// 呼び出しスレッドのフラグを下ろす。立っていたら `true`。
pub fn clear() -> bool {
    CURRENT.with(Interrupt::take)
}

impl Interrupt {
    fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                wakers: Mutex::new(Wakers::default()),
            }),
        }
    }

    /// フラグを立て、持ち主のスレッドが待機中ならそれを起こす
    pub fn interrupt(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);

        // wake() は monitor のロックを取るので、wakers のロックは先に手放す
        let wakers: Vec<Arc<dyn Wake>> = {
            let wakers = self.lock_wakers();
            wakers.entries.iter().map(|(_, w)| Arc::clone(w)).collect()
        };
        for waker in wakers {
            waker.wake();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// フラグを読んで下ろす
    pub(crate) fn take(&self) -> bool {
        self.inner.flag.swap(false, Ordering::SeqCst)
    }

    /// 待機の間だけ waker を登録する。戻り値を drop すると登録解除。
    ///
    /// 登録はフラグの確認より前に行うこと。そうすれば「確認後・待機前」に
    /// 割り込まれても、waker が monitor のロックを取ってから notify するので
    /// 起こし損ねない。
    pub(crate) fn register(&self, waker: Arc<dyn Wake>) -> Registration<'_> {
        let mut wakers = self.lock_wakers();
        let key = wakers.next_key;
        wakers.next_key = wakers.next_key.wrapping_add(1);
        wakers.entries.push((key, waker));
        Registration {
            interrupt: self,
            key,
        }
    }

    fn lock_wakers(&self) -> std::sync::MutexGuard<'_, Wakers> {
        self.inner
            .wakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupt")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

pub(crate) struct Registration<'a> {
    interrupt: &'a Interrupt,
    key: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut wakers = self.interrupt.lock_wakers();
        wakers.entries.retain(|(key, _)| *key != self.key);
    }
}
