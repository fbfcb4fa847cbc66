//! Ports - 抽象化レイヤー
//!
//! CompletionService が外部に依存する能力（実行戦略・時刻・ID 生成）を
//! trait として切り出し、テストでは決定的な実装に差し替えられるようにします。

pub mod clock;
pub mod executor;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::executor::{Executor, Job};
pub use self::id_generator::{IdGenerator, UlidGenerator};
