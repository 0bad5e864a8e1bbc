//! Adapter driver contract
//!
//! The driver owns the wire protocol to the ELM327-style adapter and the
//! bit-level decoding of each command; this crate only sees decoded
//! [`AdapterValue`]s. Links are synchronous and sequential: one request,
//! one response.
//!
//! Available drivers:
//! - [`simulated::SimulatedDriver`]: plausible time-varying vehicle data
//! - [`mock::MockDriver`]: scriptable responses for testing
//!
//! # Example
//!
//! ```ignore
//! use hud_obd::adapter::{create_driver, ConnectParams};
//! use hud_obd::config::AdapterConfig;
//!
//! let config = AdapterConfig::default();
//! let driver = create_driver(&config)?;
//! let mut link = driver.connect(&config.connect_params())?;
//! let response = link.query("RPM")?;
//! ```

pub mod error;
pub mod mock;
pub mod simulated;

pub use error::AdapterError;

use std::sync::Arc;
use std::time::Duration;

use hud_core::AdapterValue;

use crate::config::{AdapterConfig, DriverKind};

/// Parameters handed to [`AdapterDriver::connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// e.g. `socket://localhost:35000`
    pub connection_string: String,
    pub baudrate: u32,
    /// `None` lets the adapter auto-negotiate
    pub protocol_hint: Option<String>,
    pub timeout: Duration,
}

/// One decoded response
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterResponse {
    pub value: AdapterValue,
    pub unit: Option<String>,
}

impl AdapterResponse {
    pub fn new(value: impl Into<AdapterValue>, unit: Option<&str>) -> Self {
        Self {
            value: value.into(),
            unit: unit.map(str::to_string),
        }
    }

    /// "NO DATA" or an unsupported command
    pub fn null() -> Self {
        Self {
            value: AdapterValue::Null,
            unit: None,
        }
    }

    pub fn quantity(magnitude: f64, unit: &str) -> Self {
        Self {
            value: AdapterValue::Quantity {
                magnitude,
                unit: unit.to_string(),
            },
            unit: Some(unit.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// Opens links to an adapter
pub trait AdapterDriver: Send + Sync {
    /// Open a link; blocking
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn AdapterLink>, AdapterError>;
}

/// An open, sequential link to the adapter
///
/// All methods block the calling thread; callers offload them with
/// `spawn_blocking`.
pub trait AdapterLink: Send {
    fn is_connected(&self) -> bool;

    /// Human-readable adapter status
    fn status(&self) -> String;

    /// Negotiated protocol identifier, `None` when no protocol is active
    fn protocol_id(&self) -> Option<String>;

    fn protocol_name(&self) -> Option<String>;

    /// Select a protocol explicitly; returns whether the adapter accepted it
    fn set_protocol(&mut self, id: &str) -> bool;

    /// Issue one command and wait for its decoded response
    fn query(&mut self, command: &str) -> Result<AdapterResponse, AdapterError>;

    fn close(&mut self) -> Result<(), AdapterError>;
}

/// Create a driver based on configuration
pub fn create_driver(config: &AdapterConfig) -> Result<Arc<dyn AdapterDriver>, AdapterError> {
    match config.driver {
        DriverKind::Simulated => Ok(Arc::new(simulated::SimulatedDriver::new())),
        DriverKind::Mock => Ok(Arc::new(mock::MockDriver::new())),
        DriverKind::Elm327 => Err(AdapterError::Unsupported(
            "ELM327 links are provided by an external driver; use 'simulated' or 'mock'"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_driver() {
        let mut config = AdapterConfig::default();
        assert!(create_driver(&config).is_ok());

        config.driver = DriverKind::Mock;
        assert!(create_driver(&config).is_ok());

        config.driver = DriverKind::Elm327;
        assert!(matches!(
            create_driver(&config),
            Err(AdapterError::Unsupported(_))
        ));
    }

    #[test]
    fn test_response_null() {
        assert!(AdapterResponse::null().is_null());
        assert!(!AdapterResponse::quantity(1.0, "rpm").is_null());
        assert_eq!(
            AdapterResponse::new("Gasoline", None).value,
            AdapterValue::Text("Gasoline".into())
        );
    }
}
