//! Floating point precision handling
//!
//! Avoids ugly values like 62.137100000000004 on the wire.

/// Decimal places used for every published quantity
pub const PUBLISHED_PRECISION: u8 = 2;

/// Round a value to the specified number of decimal places
pub fn round_to_precision(value: f64, precision: u8) -> f64 {
    if precision == 0 {
        value.round()
    } else {
        let factor = 10_f64.powi(precision as i32);
        (value * factor).round() / factor
    }
}

/// Round to the published precision (2 decimals)
pub fn round2(value: f64) -> f64 {
    round_to_precision(value, PUBLISHED_PRECISION)
}

/// Format a value as a clean JSON number
///
/// Whole numbers are emitted as integers so `3000.0` rpm reads `3000`.
pub fn to_json_number(value: f64) -> serde_json::Value {
    let rounded = round2(value);

    if (rounded - rounded.round()).abs() < f64::EPSILON && rounded.abs() < i64::MAX as f64 {
        return serde_json::json!(rounded.round() as i64);
    }

    serde_json::json!(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_precision() {
        assert_eq!(round_to_precision(1.23456, 0), 1.0);
        assert_eq!(round_to_precision(1.23456, 1), 1.2);
        assert_eq!(round_to_precision(1.23456, 2), 1.23);
        assert_eq!(round_to_precision(1.23456, 3), 1.235);
    }

    #[test]
    fn test_round2_kmh_to_mph() {
        assert_eq!(round2(100.0 * 0.621371), 62.14);
    }

    #[test]
    fn test_to_json_number() {
        assert_eq!(to_json_number(3000.0), serde_json::json!(3000));
        assert_eq!(to_json_number(20.004), serde_json::json!(20));
        assert_eq!(to_json_number(62.1371), serde_json::json!(62.14));
        assert_eq!(to_json_number(-7.5), serde_json::json!(-7.5));
    }
}
