//! Raw query results to canonical snapshot
//!
//! Every rule is selected by the entry's [`ValueKind`]; nothing here
//! matches on parameter names.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{Conversion, Derivation, ParameterCatalog, TextRole, ValueKind};
use crate::error::NormalizeError;
use crate::precision::{round2, to_json_number};
use crate::raw::{AdapterValue, RawQueryResult};
use crate::snapshot::{Dtc, SnapshotStatus, TelemetrySnapshot};
use crate::vin::{decode_vin, VIN_LENGTH};

/// km/h to mph
pub const KMH_TO_MPH: f64 = 0.621371;

/// Maps raw results onto a [`TelemetrySnapshot`] driven by a catalog
#[derive(Debug, Clone)]
pub struct Normalizer {
    catalog: Arc<ParameterCatalog>,
}

impl Normalizer {
    pub fn new(catalog: Arc<ParameterCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ParameterCatalog {
        &self.catalog
    }

    /// Snapshot sent while the adapter is unusable
    pub fn degraded(&self, status: SnapshotStatus) -> TelemetrySnapshot {
        TelemetrySnapshot::blank(&self.catalog, status)
    }

    /// Snapshot sent when a cycle could not be normalized
    pub fn query_error(&self, err: &NormalizeError) -> TelemetrySnapshot {
        TelemetrySnapshot::query_error(&self.catalog, err.to_string())
    }

    /// Build an `OK` snapshot from one cycle's results
    ///
    /// Failed results leave their field `null`. Derived fields are computed
    /// after every queried field has been applied.
    pub fn normalize(&self, results: &[RawQueryResult]) -> Result<TelemetrySnapshot, NormalizeError> {
        let mut snapshot = TelemetrySnapshot::blank(&self.catalog, SnapshotStatus::Ok);

        for result in results {
            let Some(descriptor) = self.catalog.get(result.output_key) else {
                debug!(key = result.output_key, "Ignoring result with no catalog entry");
                continue;
            };

            match descriptor.kind {
                ValueKind::Scalar(conversion) => {
                    if result.failed {
                        continue;
                    }
                    let value = scalar(result, conversion)?;
                    snapshot.set(result.output_key, to_json_number(value));
                }
                ValueKind::Text(role) => {
                    if result.failed {
                        continue;
                    }
                    let text = result.value.to_string();
                    if role == TextRole::Vin && text.len() == VIN_LENGTH {
                        snapshot.vehicle = decode_vin(&text);
                        debug!(
                            vin = %text,
                            make = ?snapshot.vehicle.make,
                            year = ?snapshot.vehicle.model_year,
                            "Decoded VIN"
                        );
                    }
                    snapshot.set(result.output_key, Value::String(text));
                }
                ValueKind::StatusTuple => apply_status(&mut snapshot, result),
                ValueKind::DtcList => self.apply_trouble_codes(&mut snapshot, result),
                ValueKind::Derived(_) => {
                    debug!(key = result.output_key, "Ignoring queried result for derived entry");
                }
            }
        }

        for descriptor in self.catalog.derived() {
            if let ValueKind::Derived(derivation) = descriptor.kind {
                let value = derive(&snapshot, derivation)
                    .map(to_json_number)
                    .unwrap_or(Value::Null);
                snapshot.set(descriptor.output_key, value);
            }
        }

        Ok(snapshot)
    }

    /// Apply the conditional trouble-code query to a snapshot
    ///
    /// Only well-formed `(code, description)` pairs are kept; a failed query
    /// leaves the list empty.
    pub fn apply_trouble_codes(&self, snapshot: &mut TelemetrySnapshot, result: &RawQueryResult) {
        if result.failed {
            debug!("Trouble code query returned no data");
            return;
        }
        let AdapterValue::List(entries) = &result.value else {
            warn!(value = %result.value, "Trouble code query returned unexpected value");
            return;
        };

        snapshot.dtcs = entries
            .iter()
            .filter_map(|entry| match entry {
                AdapterValue::List(pair) if pair.len() == 2 => Some(Dtc {
                    code: pair[0].to_string(),
                    desc: pair[1].to_string(),
                }),
                _ => None,
            })
            .collect();
    }
}

fn scalar(result: &RawQueryResult, conversion: Conversion) -> Result<f64, NormalizeError> {
    let magnitude = result
        .value
        .as_f64()
        .ok_or_else(|| NormalizeError::UnexpectedShape {
            key: result.output_key.to_string(),
            expected: "number",
            found: result.value.shape().to_string(),
        })?;
    if !magnitude.is_finite() {
        return Err(NormalizeError::NonFinite {
            key: result.output_key.to_string(),
        });
    }

    let rounded = round2(magnitude);
    Ok(match conversion {
        Conversion::None => rounded,
        Conversion::KmhToMph => round2(rounded * KMH_TO_MPH),
    })
}

/// `(mil_on, dtc_count, ignition_type)`; anything malformed reads as MIL off
fn apply_status(snapshot: &mut TelemetrySnapshot, result: &RawQueryResult) {
    if result.failed {
        return;
    }

    let parsed = match &result.value {
        AdapterValue::List(items) if items.len() >= 2 => items[0]
            .as_bool()
            .zip(items[1].as_f64())
            .filter(|(_, count)| count.is_finite() && *count >= 0.0),
        _ => None,
    };

    match parsed {
        Some((mil_on, count)) => {
            snapshot.mil_on = mil_on;
            snapshot.dtc_count = count as u32;
        }
        None => {
            warn!(value = %result.value, "Status query returned unexpected value");
            snapshot.mil_on = false;
            snapshot.dtc_count = 0;
        }
    }
}

fn derive(snapshot: &TelemetrySnapshot, derivation: Derivation) -> Option<f64> {
    match derivation {
        Derivation::Difference {
            minuend,
            subtrahend,
        } => {
            let a = snapshot.number(minuend)?;
            let b = snapshot.number(subtrahend)?;
            Some(round2(a - b))
        }
    }
}
