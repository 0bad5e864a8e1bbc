//! hud-obd - OBD-II adapter access for the HUD
//!
//! Owns the single adapter link and turns it into per-cycle raw results.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 ConnectionManager                    │
//! │  retry/backoff, protocol fallback, idempotent close  │
//! │                                                      │
//! │        ┌──────────────────────────────┐              │
//! │        │ AdapterConnection (cloneable)│◄── one query │
//! │        │  Mutex<Box<dyn AdapterLink>> │    at a time │
//! │        └──────────────┬───────────────┘              │
//! │                       │                              │
//! │              ┌────────┴────────┐                     │
//! │              │  AdapterDriver  │                     │
//! │              │(simulated/mock) │                     │
//! │              └─────────────────┘                     │
//! └──────────────────────────────────────────────────────┘
//!                         ▲
//!                         │ concurrent fan-out
//!               ┌─────────┴─────────┐
//!               │ TelemetryAcquirer │──► Normalizer ──► TelemetrySnapshot
//!               └───────────────────┘
//! ```

pub mod acquire;
pub mod adapter;
pub mod config;
pub mod connection;
pub mod error;
pub mod sanity;

pub use acquire::TelemetryAcquirer;
pub use adapter::{create_driver, AdapterDriver, AdapterError, AdapterLink, AdapterResponse, ConnectParams};
pub use config::{AdapterConfig, DriverKind};
pub use connection::{AdapterConnection, ConnectionManager, LinkState};
pub use error::{ConnectionError, QueryError};
pub use sanity::{SanityReport, Verdict};
