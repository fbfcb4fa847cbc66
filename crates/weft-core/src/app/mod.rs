//! App - アプリケーション層
//!
//! ports と completion を組み合わせて CompletionService を組み立てます。

pub mod builder;

pub use self::builder::{BuildError, ServiceBuilder};
