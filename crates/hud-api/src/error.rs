//! Streaming error types

use thiserror::Error;

/// Failure pushing a message to a client
#[derive(Debug, Error)]
pub enum SendError {
    /// The client went away; the session ends without retrying
    #[error("Client connection closed")]
    Closed,

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Rejected `[streaming]` settings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
