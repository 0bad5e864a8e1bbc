//! Adapter driver errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Adapter did not report a connection")]
    NotConnected,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Driver not supported: {0}")]
    Unsupported(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
