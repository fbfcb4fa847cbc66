//! Domain - ドメインモデル（ID・状態・エラー）

pub mod errors;
pub mod ids;
pub mod state;

pub use self::errors::{BoxError, Interrupted, RejectedError, StateError, TaskError};
pub use self::ids::TaskId;
pub use self::state::TaskState;
