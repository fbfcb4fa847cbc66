//! IdGenerator port - TaskId の採番
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻を使う単調増加 ULID

use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use ulid::{Generator, Ulid};

use crate::domain::TaskId;
use crate::ports::Clock;

/// submit ごとに一意な TaskId を払い出す
///
/// 複数の producer スレッドから同時に呼ばれる。
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// ULID ベースの IdGenerator
///
/// 同じミリ秒内に払い出した ID も submit 順に並ぶ（ランダム部を +1 していく）。
/// ランダム部が溢れたときだけ、順序を諦めて新しいランダム値を使う。
pub struct UlidGenerator<C> {
    clock: C,
    monotonic: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            monotonic: Mutex::new(Generator::new()),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let now = self.clock.now();
        let next = self
            .monotonic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate_from_datetime(SystemTime::from(now));

        let ulid = next.unwrap_or_else(|_| {
            tracing::warn!("ulid random part overflowed within one millisecond");
            Ulid::from_parts(now.timestamp_millis() as u64, rand::random())
        });
        TaskId::from(ulid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ids_are_unique() {
        let ids = UlidGenerator::new(SystemClock);
        let mut seen: Vec<TaskId> = (0..100).map(|_| ids.generate_task_id()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn ids_within_one_millisecond_keep_issue_order() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let ids = UlidGenerator::new(FixedClock::new(fixed_time));

        let issued: Vec<TaskId> = (0..16).map(|_| ids.generate_task_id()).collect();

        assert!(issued.windows(2).all(|w| w[0] < w[1]));
        assert!(
            issued
                .iter()
                .all(|id| id.as_ulid().timestamp_ms() == fixed_time.timestamp_millis() as u64)
        );
    }
}
