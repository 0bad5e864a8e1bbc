//! Raw adapter values and per-parameter query results

use std::fmt;

/// A decoded value as returned by the adapter driver
///
/// The driver owns the bit-level decoding; what arrives here is already a
/// number, a quantity with a unit, a string or a tuple-like list.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterValue {
    /// No data (the adapter answered "NO DATA" or equivalent)
    Null,
    Bool(bool),
    Number(f64),
    /// Magnitude plus the adapter's unit label (e.g. `kilometer_per_hour`)
    Quantity { magnitude: f64, unit: String },
    Text(String),
    /// Tuple or list payloads (status tuple, trouble-code list)
    List(Vec<AdapterValue>),
}

impl AdapterValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AdapterValue::Null)
    }

    /// Numeric magnitude, if the value carries one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AdapterValue::Number(n) => Some(*n),
            AdapterValue::Quantity { magnitude, .. } => Some(*magnitude),
            AdapterValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Truthiness of a flag-like value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AdapterValue::Bool(b) => Some(*b),
            AdapterValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages
    pub fn shape(&self) -> &'static str {
        match self {
            AdapterValue::Null => "null",
            AdapterValue::Bool(_) => "bool",
            AdapterValue::Number(_) => "number",
            AdapterValue::Quantity { .. } => "quantity",
            AdapterValue::Text(_) => "text",
            AdapterValue::List(_) => "list",
        }
    }
}

impl fmt::Display for AdapterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterValue::Null => f.write_str("None"),
            AdapterValue::Bool(b) => write!(f, "{}", b),
            AdapterValue::Number(n) => write!(f, "{}", n),
            AdapterValue::Quantity { magnitude, unit } => write!(f, "{} {}", magnitude, unit),
            AdapterValue::Text(s) => f.write_str(s),
            AdapterValue::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<f64> for AdapterValue {
    fn from(n: f64) -> Self {
        AdapterValue::Number(n)
    }
}

impl From<&str> for AdapterValue {
    fn from(s: &str) -> Self {
        AdapterValue::Text(s.to_string())
    }
}

impl From<bool> for AdapterValue {
    fn from(b: bool) -> Self {
        AdapterValue::Bool(b)
    }
}

/// Outcome of one query attempt for one catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct RawQueryResult {
    pub output_key: &'static str,
    pub value: AdapterValue,
    pub unit: Option<String>,
    /// Query raised, timed out or the adapter returned a null response
    pub failed: bool,
}

impl RawQueryResult {
    /// A completed query; a null value still counts as failed
    pub fn ok(output_key: &'static str, value: AdapterValue, unit: Option<String>) -> Self {
        let failed = value.is_null();
        Self {
            output_key,
            value,
            unit,
            failed,
        }
    }

    pub fn failed(output_key: &'static str) -> Self {
        Self {
            output_key,
            value: AdapterValue::Null,
            unit: None,
            failed: true,
        }
    }
}
