//! Connection and query errors

use thiserror::Error;

use crate::adapter::AdapterError;

/// A failed connection attempt or sequence of attempts
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Adapter unreachable: {0}")]
    Unreachable(#[from] AdapterError),

    #[error("Protocol negotiation failed: {0}")]
    ProtocolNegotiation(String),

    #[error("Giving up after {attempts} connection attempts")]
    RetriesExhausted { attempts: u32 },
}

/// A single parameter query that produced no usable value
///
/// Isolated to its parameter: the field is published as `null`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("No data")]
    NullResponse,

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Query worker failed: {0}")]
    Worker(String),
}
