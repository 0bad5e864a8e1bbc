//! Telemetry snapshot published to display clients

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{
    ParameterCatalog, ValueKind, DTC_COUNT_KEY, ERROR_DETAILS_KEY, STATUS_KEY,
    VEHICLE_COUNTRY_KEY, VEHICLE_MAKE_KEY, VEHICLE_YEAR_KEY,
};
use crate::vin::VehicleInfo;

/// Top-level snapshot status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    Ok,
    ObdDisconnected,
    ObdNoProtocol,
    ObdQueryError,
}

impl SnapshotStatus {
    /// Statuses published while the adapter is unusable
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            SnapshotStatus::ObdDisconnected | SnapshotStatus::ObdNoProtocol
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStatus::Ok => "OK",
            SnapshotStatus::ObdDisconnected => "OBD_DISCONNECTED",
            SnapshotStatus::ObdNoProtocol => "OBD_NO_PROTOCOL",
            SnapshotStatus::ObdQueryError => "OBD_QUERY_ERROR",
        }
    }
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored diagnostic trouble code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dtc {
    /// e.g. "P0301"
    pub code: String,
    pub desc: String,
}

/// One complete, schema-stable reading
///
/// Every catalog key is always present: values are `null` when their
/// query failed, never omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub status: SnapshotStatus,
    /// Catalog values and unit companions
    values: BTreeMap<String, Value>,
    pub mil_on: bool,
    pub dtc_count: u32,
    pub dtcs: Vec<Dtc>,
    pub vehicle: VehicleInfo,
    pub error_details: Option<String>,
}

impl TelemetrySnapshot {
    /// A snapshot with every value `null` and every unit set to its
    /// canonical label
    pub fn blank(catalog: &ParameterCatalog, status: SnapshotStatus) -> Self {
        let mut values = BTreeMap::new();
        for d in catalog.descriptors() {
            match d.kind {
                // Published as typed top-level fields
                ValueKind::StatusTuple | ValueKind::DtcList => {}
                _ => {
                    values.insert(d.output_key.to_string(), Value::Null);
                    if let (Some(unit_key), Some(unit)) = (d.unit_key(), d.unit) {
                        values.insert(unit_key, Value::String(unit.to_string()));
                    }
                }
            }
        }

        Self {
            status,
            values,
            mil_on: false,
            dtc_count: 0,
            dtcs: Vec::new(),
            vehicle: VehicleInfo::default(),
            error_details: None,
        }
    }

    /// Snapshot reporting a failed cycle
    pub fn query_error(catalog: &ParameterCatalog, details: impl Into<String>) -> Self {
        let mut snapshot = Self::blank(catalog, SnapshotStatus::ObdQueryError);
        snapshot.error_details = Some(details.into());
        snapshot
    }

    /// Value of a catalog key (`None` if the key is unknown)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Numeric value of a catalog key, if populated
    pub fn number(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    /// Text value of a catalog key, if populated
    pub fn text(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Set a catalog value; unknown keys are ignored so the schema stays fixed
    pub(crate) fn set(&mut self, key: &str, value: Value) -> bool {
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Whether the conditional trouble-code query is due this cycle
    pub fn trouble_codes_due(&self) -> bool {
        self.mil_on && self.dtc_count > 0
    }

    /// Number of populated telemetry values
    ///
    /// Unit companions, the status and the trouble-code list are not counted.
    pub fn populated_count(&self) -> usize {
        let values = self
            .values
            .iter()
            .filter(|(k, v)| !k.ends_with(crate::catalog::UNIT_SUFFIX) && !v.is_null())
            .count();
        let vehicle = [
            self.vehicle.make.is_some(),
            self.vehicle.model_year.is_some(),
            self.vehicle.country.is_some(),
        ]
        .iter()
        .filter(|&&present| present)
        .count();
        values + vehicle
    }

    /// Serialize to the JSON text pushed to clients
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for TelemetrySnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = 7 + usize::from(self.error_details.is_some());
        let mut map = serializer.serialize_map(Some(self.values.len() + extra))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(STATUS_KEY, &self.status)?;
        map.serialize_entry("mil_on", &self.mil_on)?;
        map.serialize_entry(DTC_COUNT_KEY, &self.dtc_count)?;
        map.serialize_entry("dtcs", &self.dtcs)?;
        map.serialize_entry(VEHICLE_MAKE_KEY, &self.vehicle.make)?;
        map.serialize_entry(VEHICLE_YEAR_KEY, &self.vehicle.model_year)?;
        map.serialize_entry(VEHICLE_COUNTRY_KEY, &self.vehicle.country)?;
        if let Some(details) = &self.error_details {
            map.serialize_entry(ERROR_DETAILS_KEY, details)?;
        }
        map.end()
    }
}
