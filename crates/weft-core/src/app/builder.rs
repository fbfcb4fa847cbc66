//! ServiceBuilder - CompletionService の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）

use std::marker::PhantomData;
use std::sync::Arc;

use crate::completion::CompletionService;
use crate::domain::BoxError;
use crate::ports::{Clock, Executor, IdGenerator, SystemClock, UlidGenerator};

/// ServiceBuilder は CompletionService を構築
///
/// # 使用例
/// ```ignore
/// let service = ServiceBuilder::<u32>::new()
///     .executor(ThreadPoolExecutor::new(PoolConfig::default())?)
///     .clock(FixedClock::new(at))
///     .build()?;
/// ```
///
/// # 既定値
/// - clock: `SystemClock`
/// - id_generator: clock を使う `UlidGenerator`
/// - executor: なし（build 時に `BuildError::MissingExecutor`）
pub struct ServiceBuilder<V, E = BoxError> {
    executor: Option<Arc<dyn Executor>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    _marker: PhantomData<fn() -> (V, E)>,
}

/// BuildError は CompletionService 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no executor configured; call ServiceBuilder::executor() before build()")]
    MissingExecutor,
}

impl<V, E> ServiceBuilder<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            executor: None,
            clock: None,
            ids: None,
            _marker: PhantomData,
        }
    }

    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    pub fn build(self) -> Result<CompletionService<V, E>, BuildError> {
        let executor = self.executor.ok_or(BuildError::MissingExecutor)?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        Ok(CompletionService::from_parts(executor, clock, ids))
    }
}

impl<V, E> Default for ServiceBuilder<V, E>
where
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
