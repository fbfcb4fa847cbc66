//! Domain identifiers - TaskId
//!
//! TaskHandle の同一性は `Arc` の参照同一性で十分ですが、ログやスナップショットで
//! タスクを区別できるように ULID ベースの `TaskId` を振ります。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: submit 順に並ぶ（完了順とは無関係）
//! - **分散生成可能**: 複数の producer スレッドから調整なしで生成できる

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// 1 回の submit を識別する ID
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    /// ULID から TaskId を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_task_prefix() {
        let id = TaskId::from_ulid(Ulid::new());
        assert!(id.to_string().starts_with("task-"));
        assert_eq!(id.to_string().len(), "task-".len() + 26);
    }

    #[test]
    fn serde_is_transparent_over_ulid() {
        let ulid = Ulid::new();
        let id = TaskId::from(ulid);
        let s = serde_json::to_string(&id).unwrap();
        assert_eq!(s, format!("\"{ulid}\""));
        let back: TaskId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, id);
    }
}
