//! Errors - エラー型と分類
//!
//! # 分類
//! - **RejectedError**: executor が submit を拒否した（同期的に返る、handle は作られない）
//! - **StateError**: 終端状態の handle に再度結果を書こうとした（プログラミングエラー）
//! - **Interrupted**: blocking wait が interrupt で中断された
//! - **TaskError**: handle から結果を読んだ consumer に届くエラー
//!
//! task 本体のエラーは producer スレッドでは投げられず、handle に保存されて
//! 結果を読んだ consumer に届きます。

use std::sync::Arc;

use thiserror::Error;

use super::ids::TaskId;
use super::state::TaskState;

/// 型を決めない場合の task エラー
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Executor が task を受け付けなかった理由
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectedError {
    #[error("executor is saturated (capacity={capacity})")]
    Saturated { capacity: usize },

    #[error("executor has been shut down")]
    Shutdown,

    #[error("executor refused the task: {0}")]
    Other(String),
}

/// blocking wait が呼び出しスレッドの割り込みフラグを観測した
///
/// queue も handle も変化しないので、待ち直すかどうかは呼び出し側が決める。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait was interrupted")]
pub struct Interrupted;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("{id} is already {state}")]
    AlreadyTerminal { id: TaskId, state: TaskState },
}

/// TaskHandle の結果読み出しで返るエラー
///
/// `Failed` は task 本体が返したエラーそのもの（`Arc` で共有）で、
/// ラッパー側のエラーで包み直すことはしません。
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error("task failed: {0}")]
    Failed(Arc<E>),

    #[error("task panicked: {0}")]
    Panicked(Arc<str>),

    #[error("task was cancelled")]
    Cancelled,

    #[error("timed out waiting for task result")]
    Timeout,

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl<E> TaskError<E> {
    /// task 本体が返したエラー（`Failed` のときだけ）
    pub fn failure(&self) -> Option<&Arc<E>> {
        match self {
            TaskError::Failed(cause) => Some(cause),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout)
    }
}
