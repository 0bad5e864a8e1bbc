//! Streaming cadence configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// `[streaming]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Pause between cycles while the adapter is ready
    pub poll_interval_ms: u64,
    /// Pause between degraded snapshots while it is not
    pub degraded_interval_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            degraded_interval_ms: 2000,
        }
    }
}

impl StreamingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn degraded_interval(&self) -> Duration {
        Duration::from_millis(self.degraded_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "streaming.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.degraded_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "streaming.degraded_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
