//! Error types for catalog construction and normalization

use thiserror::Error;

/// Invariant violations found while building a [`crate::ParameterCatalog`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate output key: {0}")]
    DuplicateKey(String),

    #[error("Parameter '{0}' has no adapter command")]
    MissingCommand(String),

    #[error("Derived parameter '{0}' must not declare an adapter command")]
    DerivedWithCommand(String),

    #[error("Derived parameter '{key}' reads unknown input '{input}'")]
    UnknownDerivedInput { key: String, input: String },
}

/// A raw value that cannot be mapped onto its catalog entry
///
/// Caught at the cycle level: the cycle is reported as `OBD_QUERY_ERROR`
/// with the message as `error_details`, the publisher keeps running.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("Unexpected value for '{key}': expected {expected}, got {found}")]
    UnexpectedShape {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("Non-finite value for '{key}'")]
    NonFinite { key: String },
}
