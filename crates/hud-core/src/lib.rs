//! hud-core - Core telemetry types for the OBD heads-up display
//!
//! This crate holds everything that does not touch the adapter or the
//! client transport:
//!
//! - [`ParameterCatalog`]: the declarative list of queryable parameters
//! - [`RawQueryResult`] / [`AdapterValue`]: what one adapter query produced
//! - [`Normalizer`]: raw results in, a schema-stable [`TelemetrySnapshot`] out
//! - [`vin`]: world manufacturer / model year / country decoding
//!
//! ```text
//! RawQueryResult ──┐
//! RawQueryResult ──┼──► Normalizer ──► TelemetrySnapshot ──► JSON
//! RawQueryResult ──┘        │
//!                    ParameterCatalog
//! ```

pub mod catalog;
pub mod error;
pub mod normalize;
pub mod precision;
pub mod raw;
pub mod snapshot;
pub mod vin;

pub use catalog::{Conversion, Derivation, ParameterCatalog, ParameterDescriptor, TextRole, ValueKind};
pub use error::{CatalogError, NormalizeError};
pub use normalize::Normalizer;
pub use raw::{AdapterValue, RawQueryResult};
pub use snapshot::{Dtc, SnapshotStatus, TelemetrySnapshot};
pub use vin::{decode_vin, VehicleInfo};
