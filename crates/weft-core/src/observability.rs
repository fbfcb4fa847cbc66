use serde::{Deserialize, Serialize};

/// CompletionService の累計カウンタ
///
/// `ready` だけは現在値（完了済みでまだ誰にも取り出されていない handle の数）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub ready: usize,
}

impl ServiceStats {
    /// executor が受け付けて、まだ終端状態になっていない task の数
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.failed + self.cancelled)
    }
}
