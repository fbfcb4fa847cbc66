//! Config - 同梱の ThreadPoolExecutor の設定

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("workers must be at least 1")]
    ZeroWorkers,

    #[error("queue_capacity must be at least 1 when set")]
    ZeroCapacity,

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// ThreadPoolExecutor の設定
///
/// JSON の例（省略したフィールドは既定値）:
/// ```json
/// { "workers": 4, "queue_capacity": 1024, "thread_name": "weft-worker" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// ワーカースレッド数
    pub workers: usize,

    /// ワーカー待ちにできる Job の上限（`None` なら無制限）
    ///
    /// 超えた submit は `RejectedError::Saturated` で拒否される。
    pub queue_capacity: Option<usize>,

    /// スレッド名は `{thread_name}-{index}`
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_capacity: None,
            thread_name: "weft-worker".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    /// JSON から読み込んで検証する
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_is_valid() {
        let config = PoolConfig::default();
        assert!(config.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = PoolConfig::from_json(r#"{ "workers": 2 }"#).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.thread_name, "weft-worker");
    }

    #[rstest]
    #[case::zero_workers(r#"{ "workers": 0 }"#)]
    #[case::zero_capacity(r#"{ "workers": 1, "queue_capacity": 0 }"#)]
    #[case::not_json("workers = 3")]
    fn invalid_configs_are_rejected(#[case] json: &str) {
        assert!(PoolConfig::from_json(json).is_err());
    }

    #[test]
    fn builders_set_fields() {
        let config = PoolConfig::default().with_workers(3).with_queue_capacity(8);
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_capacity, Some(8));
    }
}
