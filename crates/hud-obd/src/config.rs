//! Adapter configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterError, ConnectParams};

/// Which driver opens the adapter link
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Built-in vehicle simulator
    #[default]
    Simulated,
    /// Scriptable mock for testing
    Mock,
    /// Real ELM327 over a socket (external driver)
    Elm327,
}

/// `[adapter]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub driver: DriverKind,
    /// Adapter host (the emulator listens on localhost)
    pub host: String,
    pub port: u16,
    pub baudrate: u32,
    /// Per-request timeout enforced by the driver
    pub timeout_ms: u64,
    /// Connection attempts before giving up
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Protocol selected when none was auto-negotiated ("6" = ISO 15765-4 CAN 11/500)
    pub fallback_protocol: String,
    /// Wait after an explicit protocol selection before re-checking it
    pub protocol_settle_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            host: "localhost".to_string(),
            port: 35000,
            baudrate: 38400,
            timeout_ms: 3000,
            max_retries: 3,
            retry_delay_ms: 2000,
            fallback_protocol: "6".to_string(),
            protocol_settle_ms: 500,
        }
    }
}

impl AdapterConfig {
    pub fn connection_string(&self) -> String {
        format!("socket://{}:{}", self.host, self.port)
    }

    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            connection_string: self.connection_string(),
            baudrate: self.baudrate,
            protocol_hint: None,
            timeout: self.timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn protocol_settle(&self) -> Duration {
        Duration::from_millis(self.protocol_settle_ms)
    }

    pub fn validate(&self) -> Result<(), AdapterError> {
        if self.max_retries == 0 {
            return Err(AdapterError::InvalidConfig(
                "adapter.max_retries must be at least 1".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "adapter.host must not be empty".to_string(),
            ));
        }
        if self.fallback_protocol.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "adapter.fallback_protocol must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.connection_string(), "socket://localhost:35000");
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert!(config.validate().is_ok());

        let params = config.connect_params();
        assert_eq!(params.baudrate, 38400);
        assert_eq!(params.protocol_hint, None);
        assert_eq!(params.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AdapterConfig = toml::from_str(
            r#"
            driver = "mock"
            port = 35001
            "#,
        )
        .unwrap();
        assert_eq!(config.driver, DriverKind::Mock);
        assert_eq!(config.port, 35001);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = AdapterConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AdapterError::InvalidConfig(_))
        ));
    }
}
