//! Daemon configuration file

use std::path::Path;

use anyhow::Context;
use hud_api::StreamingConfig;
use hud_obd::AdapterConfig;
use serde::{Deserialize, Serialize};

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// WebSocket route; the stream is also served at `/`
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            path: "/ws".to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HudConfig {
    pub server: ServerConfig,
    pub adapter: AdapterConfig,
    pub streaming: StreamingConfig,
}

impl HudConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.server.path.starts_with('/') {
            anyhow::bail!("server.path must start with '/': {}", self.server.path);
        }
        self.adapter.validate()?;
        self.streaming.validate()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hud_obd::DriverKind;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = HudConfig::parse("").unwrap();
        assert_eq!(config, HudConfig::default());
        assert_eq!(config.bind_addr(), "127.0.0.1:8765");
        assert_eq!(config.server.path, "/ws");
        assert_eq!(config.streaming.poll_interval_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let config = HudConfig::parse(include_str!("../../../config/hudd.toml")).unwrap();
        assert_eq!(config, HudConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = HudConfig::parse(
            r#"
            [server]
            port = 9000

            [adapter]
            driver = "mock"
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.adapter.driver, DriverKind::Mock);
        assert_eq!(config.adapter.max_retries, 5);
        assert_eq!(config.adapter.port, 35000);
        assert_eq!(config.streaming, StreamingConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[streaming]\npoll_interval_ms = 250").unwrap();

        let config = HudConfig::load(file.path()).unwrap();
        assert_eq!(config.streaming.poll_interval_ms, 250);
        assert_eq!(config.streaming.degraded_interval_ms, 2000);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = HudConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_unknown_driver_rejected() {
        assert!(HudConfig::parse("[adapter]\ndriver = \"bluetooth\"").is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = HudConfig::default();
        config.server.path = "ws".to_string();
        assert!(config.validate().is_err());

        let mut config = HudConfig::default();
        config.adapter.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = HudConfig::default();
        config.streaming.degraded_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
