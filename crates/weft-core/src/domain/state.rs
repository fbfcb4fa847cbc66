//! TaskState - handle の状態遷移

use serde::{Deserialize, Serialize};
use std::fmt;

/// TaskHandle の状態
///
/// 状態遷移:
/// - Pending -> Running -> Completed | Failed | Cancelled
/// - Pending -> Cancelled (実行前にキャンセルされた場合、本体は実行されない)
///
/// 終端状態（Completed / Failed / Cancelled）からの遷移はありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// submit 済み、まだ executor に拾われていない
    Pending,

    /// executor のどこかのスレッドで本体が実行中
    Running,

    /// 本体が値を返した（副作用 task なら固定の結果）
    Completed,

    /// 本体がエラーを返した、または panic した
    Failed,

    /// 結果が確定する前にキャンセルされた
    Cancelled,
}

impl TaskState {
    /// 終端状態か（これ以上遷移しない）
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Failed => "FAILED",
            TaskState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(TaskState::Pending, false)]
    #[case::running(TaskState::Running, false)]
    #[case::completed(TaskState::Completed, true)]
    #[case::failed(TaskState::Failed, true)]
    #[case::cancelled(TaskState::Cancelled, true)]
    fn terminal_states(#[case] state: TaskState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let s = serde_json::to_string(&TaskState::Cancelled).unwrap();
        assert_eq!(s, "\"CANCELLED\"");
        assert_eq!(TaskState::Running.to_string(), "RUNNING");
    }
}
