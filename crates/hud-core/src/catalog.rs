//! Parameter catalog
//!
//! Declarative registry of every telemetry parameter the HUD knows about.
//! Each entry names the adapter command that produces it, the key it is
//! published under, its canonical unit and how its raw value is shaped.
//! Normalization is driven entirely from this table; special handling
//! (speed conversion, VIN decoding, status/DTC tuples, boost pressure)
//! is expressed as tagged entries rather than per-field code paths.

use std::collections::{HashMap, HashSet};

use crate::error::CatalogError;

/// Companion key populated from the status tuple next to `mil_on`
pub const DTC_COUNT_KEY: &str = "dtc_count";
/// Decoded VIN fields
pub const VEHICLE_MAKE_KEY: &str = "vehicle_make";
pub const VEHICLE_YEAR_KEY: &str = "vehicle_year";
pub const VEHICLE_COUNTRY_KEY: &str = "vehicle_country";
/// Top-level status key
pub const STATUS_KEY: &str = "status";
/// Present only on `OBD_QUERY_ERROR`
pub const ERROR_DETAILS_KEY: &str = "error_details";

/// Suffix of the unit companion field
pub const UNIT_SUFFIX: &str = "_unit";

/// Unit conversion applied to the rounded magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Value is published in the adapter's unit
    None,
    /// km/h to mph (factor 0.621371)
    KmhToMph,
}

/// Role of a text-valued parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Plain,
    /// The VIN; also feeds the decoded vehicle fields
    Vin,
}

/// How a derived parameter is computed from other catalog entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// `minuend - subtrahend`, only when both are present
    Difference {
        minuend: &'static str,
        subtrahend: &'static str,
    },
}

impl Derivation {
    /// Output keys this derivation reads
    pub fn inputs(&self) -> Vec<&'static str> {
        match self {
            Derivation::Difference {
                minuend,
                subtrahend,
            } => vec![*minuend, *subtrahend],
        }
    }
}

/// Shape of a parameter's raw value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Numeric quantity, rounded to 2 decimals
    Scalar(Conversion),
    /// Coerced to its textual representation, no unit
    Text(TextRole),
    /// `(mil_on, dtc_count, ignition_type)` tuple
    StatusTuple,
    /// List of `(code, description)` pairs; fetched conditionally
    DtcList,
    /// Computed from other entries, never queried
    Derived(Derivation),
}

/// One entry of the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Stable parameter identifier
    pub id: &'static str,
    /// Adapter-side command key (`None` for derived entries)
    pub command: Option<&'static str>,
    /// Key in the published snapshot
    pub output_key: &'static str,
    /// Canonical unit, published as `<output_key>_unit`
    pub unit: Option<&'static str>,
    pub kind: ValueKind,
}

impl ParameterDescriptor {
    const fn scalar(command: &'static str, output_key: &'static str, unit: &'static str) -> Self {
        Self {
            id: command,
            command: Some(command),
            output_key,
            unit: Some(unit),
            kind: ValueKind::Scalar(Conversion::None),
        }
    }

    const fn text(command: &'static str, output_key: &'static str) -> Self {
        Self {
            id: command,
            command: Some(command),
            output_key,
            unit: None,
            kind: ValueKind::Text(TextRole::Plain),
        }
    }

    /// Name of the unit companion field, if the entry carries a unit
    pub fn unit_key(&self) -> Option<String> {
        self.unit
            .map(|_| format!("{}{}", self.output_key, UNIT_SUFFIX))
    }

    /// Whether this entry is part of the per-cycle concurrent fan-out
    pub fn is_polled(&self) -> bool {
        self.command.is_some()
            && !matches!(self.kind, ValueKind::DtcList | ValueKind::Derived(_))
    }
}

/// Speed is special-cased by conversion, not by name
const SPEED: ParameterDescriptor = ParameterDescriptor {
    id: "SPEED",
    command: Some("SPEED"),
    output_key: "speed",
    unit: Some("mph"),
    kind: ValueKind::Scalar(Conversion::KmhToMph),
};

const VIN: ParameterDescriptor = ParameterDescriptor {
    id: "VIN",
    command: Some("VIN"),
    output_key: "vin",
    unit: None,
    kind: ValueKind::Text(TextRole::Vin),
};

const STATUS: ParameterDescriptor = ParameterDescriptor {
    id: "STATUS",
    command: Some("STATUS"),
    output_key: "mil_on",
    unit: None,
    kind: ValueKind::StatusTuple,
};

const GET_DTC: ParameterDescriptor = ParameterDescriptor {
    id: "GET_DTC",
    command: Some("GET_DTC"),
    output_key: "dtcs",
    unit: None,
    kind: ValueKind::DtcList,
};

const BOOST_PRESSURE: ParameterDescriptor = ParameterDescriptor {
    id: "BOOST_PRESSURE",
    command: None,
    output_key: "boost_pressure",
    unit: Some("kPa"),
    kind: ValueKind::Derived(Derivation::Difference {
        minuend: "manifold_pressure",
        subtrahend: "baro_pressure",
    }),
};

/// The standard HUD parameter set
static STANDARD: &[ParameterDescriptor] = &[
    // Core
    ParameterDescriptor::scalar("RPM", "rpm", "rpm"),
    SPEED,
    ParameterDescriptor::scalar("COOLANT_TEMP", "coolant_temp", "celsius"),
    ParameterDescriptor::scalar("THROTTLE_POS", "throttle_pos", "%"),
    ParameterDescriptor::scalar("FUEL_LEVEL", "fuel_level", "%"),
    ParameterDescriptor::scalar("ENGINE_LOAD", "engine_load", "%"),
    // Engine and fuel system
    ParameterDescriptor::scalar("INTAKE_TEMP", "intake_temp", "celsius"),
    ParameterDescriptor::scalar("MAF", "maf", "grams/sec"),
    ParameterDescriptor::scalar("FUEL_PRESSURE", "fuel_pressure", "kPa"),
    ParameterDescriptor::scalar("FUEL_RAIL_PRESSURE_ABS", "fuel_rail_pressure", "kPa"),
    ParameterDescriptor::scalar(
        "FUEL_RAIL_PRESSURE_DIRECT",
        "fuel_rail_pressure_direct",
        "kPa",
    ),
    ParameterDescriptor::scalar("FUEL_INJECTION_TIMING", "fuel_injection_timing", "degrees"),
    ParameterDescriptor::scalar("FUEL_RATE", "fuel_rate", "L/h"),
    ParameterDescriptor::scalar("SHORT_FUEL_TRIM_1", "short_fuel_trim_1", "%"),
    ParameterDescriptor::scalar("LONG_FUEL_TRIM_1", "long_fuel_trim_1", "%"),
    ParameterDescriptor::scalar("SHORT_FUEL_TRIM_2", "short_fuel_trim_2", "%"),
    ParameterDescriptor::scalar("LONG_FUEL_TRIM_2", "long_fuel_trim_2", "%"),
    ParameterDescriptor::text("FUEL_TYPE", "fuel_type"),
    ParameterDescriptor::scalar("ETHANOL_PERCENT", "ethanol_percent", "%"),
    ParameterDescriptor::scalar("EVAP_VAPOR_PRESSURE", "evap_vapor_pressure", "Pa"),
    // Emissions
    ParameterDescriptor::scalar("O2_S1_WR_VOLTAGE", "o2_sensor_1_voltage", "V"),
    ParameterDescriptor::scalar("O2_S2_WR_VOLTAGE", "o2_sensor_2_voltage", "V"),
    ParameterDescriptor::scalar("CATALYST_TEMP_B1S1", "catalyst_temp_b1s1", "celsius"),
    ParameterDescriptor::scalar("CATALYST_TEMP_B2S1", "catalyst_temp_b2s1", "celsius"),
    ParameterDescriptor::scalar("EGR_ERROR", "egr_error", "%"),
    ParameterDescriptor::scalar("COMMANDED_EGR", "egr_commanded", "%"),
    ParameterDescriptor::scalar("EVAP_VAPOR_PRESSURE_ABS", "evap_vapor_pressure_abs", "kPa"),
    // Temperatures
    ParameterDescriptor::scalar("AMBIANT_AIR_TEMP", "ambient_air_temp", "celsius"),
    ParameterDescriptor::scalar("OIL_TEMP", "engine_oil_temp", "celsius"),
    ParameterDescriptor::scalar("FUEL_TEMP", "fuel_temp", "celsius"),
    // Driving dynamics
    ParameterDescriptor::scalar("TIMING_ADVANCE", "timing_advance", "degrees"),
    ParameterDescriptor::scalar("ABSOLUTE_THROTTLE_POS", "abs_throttle_pos", "%"),
    ParameterDescriptor::scalar("RELATIVE_THROTTLE_POS", "rel_throttle_pos", "%"),
    ParameterDescriptor::scalar("ACCELERATOR_POS_D", "accel_pedal_pos", "%"),
    ParameterDescriptor::scalar("COMMANDED_THROTTLE_ACTUATOR", "commanded_throttle", "%"),
    ParameterDescriptor::scalar("INTAKE_PRESSURE", "manifold_pressure", "kPa"),
    ParameterDescriptor::scalar("BAROMETRIC_PRESSURE", "baro_pressure", "kPa"),
    ParameterDescriptor::scalar("ABSOLUTE_LOAD", "abs_load", "%"),
    ParameterDescriptor::scalar("RELATIVE_LOAD", "rel_load", "%"),
    ParameterDescriptor::scalar("DISTANCE_W_MIL", "distance_with_mil", "km"),
    ParameterDescriptor::scalar(
        "DISTANCE_SINCE_DTC_CLEAR",
        "distance_since_codes_cleared",
        "km",
    ),
    ParameterDescriptor::scalar("RUN_TIME", "runtime_since_engine_start", "seconds"),
    ParameterDescriptor::scalar(
        "TIME_SINCE_DTC_CLEARED",
        "time_since_codes_cleared",
        "minutes",
    ),
    // Electrical
    ParameterDescriptor::scalar("CONTROL_MODULE_VOLTAGE", "control_module_voltage", "V"),
    ParameterDescriptor::scalar("HYBRID_BATTERY_REMAINING", "hybrid_battery_remaining", "%"),
    // Advanced engine
    ParameterDescriptor::scalar("ENGINE_FRICTION_PERCENT", "engine_friction_percent", "%"),
    ParameterDescriptor::scalar("DRIVER_DEMAND_ENGINE_TORQUE", "driver_demand_torque", "%"),
    ParameterDescriptor::scalar("ACTUAL_ENGINE_TORQUE", "actual_engine_torque", "%"),
    ParameterDescriptor::scalar("ENGINE_REFERENCE_TORQUE", "engine_ref_torque", "Nm"),
    BOOST_PRESSURE,
    ParameterDescriptor::scalar("CHARGE_AIR_TEMP", "charge_air_temp", "celsius"),
    // Vehicle information
    VIN,
    ParameterDescriptor::text("ECU_NAME", "ecu_name"),
    ParameterDescriptor::text("FUEL_STATUS", "fuel_system_status"),
    ParameterDescriptor::text("OBD_COMPLIANCE", "obd_standards"),
    // Monitor status and trouble codes
    STATUS,
    GET_DTC,
];

/// Validated, indexed set of parameter descriptors
#[derive(Debug, Clone)]
pub struct ParameterCatalog {
    descriptors: Vec<ParameterDescriptor>,
    by_key: HashMap<&'static str, usize>,
}

impl ParameterCatalog {
    /// The built-in HUD catalog
    pub fn standard() -> Self {
        // The static table is covered by `test_standard_catalog_is_valid`.
        Self::index(STANDARD.to_vec())
    }

    /// Build a catalog from custom descriptors, validating its invariants
    pub fn from_descriptors(descriptors: Vec<ParameterDescriptor>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for d in &descriptors {
            if !seen.insert(d.output_key) {
                return Err(CatalogError::DuplicateKey(d.output_key.to_string()));
            }
            match (&d.kind, d.command) {
                (ValueKind::Derived(_), Some(_)) => {
                    return Err(CatalogError::DerivedWithCommand(d.output_key.to_string()))
                }
                (ValueKind::Derived(_), None) => {}
                (_, None) => return Err(CatalogError::MissingCommand(d.output_key.to_string())),
                _ => {}
            }
        }

        for d in &descriptors {
            if let ValueKind::Derived(derivation) = &d.kind {
                for input in derivation.inputs() {
                    let known = descriptors
                        .iter()
                        .any(|other| other.output_key == input && other.command.is_some());
                    if !known {
                        return Err(CatalogError::UnknownDerivedInput {
                            key: d.output_key.to_string(),
                            input: input.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self::index(descriptors))
    }

    fn index(descriptors: Vec<ParameterDescriptor>) -> Self {
        let by_key = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.output_key, i))
            .collect();
        Self {
            descriptors,
            by_key,
        }
    }

    /// All descriptors, in catalog order
    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    /// Descriptors queried in every acquisition cycle
    pub fn polled(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.descriptors.iter().filter(|d| d.is_polled())
    }

    /// Derived descriptors
    pub fn derived(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| matches!(d.kind, ValueKind::Derived(_)))
    }

    /// The conditional trouble-code entry, if the catalog has one
    pub fn trouble_codes(&self) -> Option<&ParameterDescriptor> {
        self.descriptors
            .iter()
            .find(|d| matches!(d.kind, ValueKind::DtcList))
    }

    /// Look up a descriptor by its output key
    pub fn get(&self, output_key: &str) -> Option<&ParameterDescriptor> {
        self.by_key.get(output_key).map(|&i| &self.descriptors[i])
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Every key a snapshot built from this catalog contains
    ///
    /// `error_details` is excluded: it only appears on `OBD_QUERY_ERROR`.
    pub fn schema_keys(&self) -> Vec<String> {
        let mut keys = vec![STATUS_KEY.to_string()];
        for d in &self.descriptors {
            match d.kind {
                ValueKind::StatusTuple => {
                    keys.push(d.output_key.to_string());
                    keys.push(DTC_COUNT_KEY.to_string());
                }
                ValueKind::Text(TextRole::Vin) => {
                    keys.push(d.output_key.to_string());
                    keys.push(VEHICLE_MAKE_KEY.to_string());
                    keys.push(VEHICLE_YEAR_KEY.to_string());
                    keys.push(VEHICLE_COUNTRY_KEY.to_string());
                }
                _ => {
                    keys.push(d.output_key.to_string());
                    if let Some(unit_key) = d.unit_key() {
                        keys.push(unit_key);
                    }
                }
            }
        }
        keys
    }
}

impl Default for ParameterCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
