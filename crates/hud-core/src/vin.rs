//! VIN decoding
//!
//! Extracts the manufacturer (WMI, positions 1-3), the model year
//! (position 10) and the country of manufacture (position 1).
//!
//! Model year letters repeat every 30 years, so position 10 alone is
//! ambiguous between the 1980-2009 and 2010-2039 cycles. Position 7 is
//! used as the disambiguator: a letter there selects the 2010+ cycle, a
//! digit selects the 1980-2009 cycle.

use serde::Serialize;

/// Length of a modern (post-1981) VIN
pub const VIN_LENGTH: usize = 17;

/// World manufacturer identifiers (two- and three-character prefixes)
const MANUFACTURER_CODES: &[(&str, &str)] = &[
    // North America
    ("1G", "General Motors (US)"),
    ("1G1", "Chevrolet"),
    ("1GC", "Chevrolet Truck"),
    ("1GD", "GMC Truck"),
    ("1GM", "Pontiac"),
    ("1G2", "Pontiac"),
    ("1G3", "Oldsmobile"),
    ("1G4", "Buick"),
    ("1G6", "Cadillac"),
    ("1H", "Honda (US)"),
    ("1HD", "Harley-Davidson"),
    ("1J", "Jeep"),
    ("1L", "Lincoln"),
    ("1M", "Mercury"),
    ("1N", "Nissan (US)"),
    ("1V", "Volkswagen (US)"),
    ("1Y", "General Motors (US)"),
    ("2F", "Ford (Canada)"),
    ("2G", "General Motors (Canada)"),
    ("2H", "Honda (Canada)"),
    ("2M", "Mercury (Canada)"),
    ("2T", "Toyota (Canada)"),
    ("3F", "Ford (Mexico)"),
    ("3G", "General Motors (Mexico)"),
    ("3H", "Honda (Mexico)"),
    ("3N", "Nissan (Mexico)"),
    ("3V", "Volkswagen (Mexico)"),
    ("4F", "Mazda (USA)"),
    ("4M", "Mercury (Mexico)"),
    ("4S", "Subaru (USA)"),
    ("4T", "Toyota (USA)"),
    ("4U", "Subaru"),
    ("5F", "Honda (US)"),
    ("5L", "Lincoln (US)"),
    ("5N", "Hyundai (Korea)"),
    ("5T", "Toyota (US Truck)"),
    ("5Y", "Mazda (US)"),
    // Asia
    ("JA", "Isuzu"),
    ("JF", "Fuji Heavy Industries (Subaru)"),
    ("JH", "Honda (Japan)"),
    ("JM", "Mazda (Japan)"),
    ("JN", "Nissan (Japan)"),
    ("JS", "Suzuki (Japan)"),
    ("JT", "Toyota (Japan)"),
    ("KL", "Daewoo/GM Korea"),
    ("KM", "Hyundai"),
    ("KN", "Kia"),
    ("L5", "Lincoln"),
    ("NM", "Mitsubishi (Japan)"),
    // Europe
    ("SAL", "Land Rover"),
    ("SAJ", "Jaguar"),
    ("SAR", "Rover"),
    ("SCC", "Lotus"),
    ("SCF", "Aston Martin"),
    ("SDB", "Peugeot"),
    ("SFD", "Alexander Dennis"),
    ("SHS", "Honda (UK)"),
    ("SJN", "Nissan (UK)"),
    ("TM", "Mitsubishi (Japan)"),
    ("TMB", "Skoda"),
    ("TRU", "Audi"),
    ("VF1", "Renault"),
    ("VF3", "Peugeot"),
    ("VF7", "Citroën"),
    ("VNK", "Toyota (Japan)"),
    ("VS5", "Toyota (Japan)"),
    ("VV", "Volkswagen (Spain)"),
    ("VWV", "Volkswagen"),
    ("W0L", "Opel/Vauxhall"),
    ("WA1", "Audi SUV"),
    ("WAU", "Audi"),
    ("WBA", "BMW"),
    ("WBS", "BMW M"),
    ("WDB", "Mercedes-Benz"),
    ("WDC", "Mercedes-Benz SUV"),
    ("WDD", "Mercedes-Benz"),
    ("WMW", "Mini"),
    ("WP0", "Porsche"),
    ("WP1", "Porsche SUV"),
    ("WUA", "Audi Sport"),
    ("WVG", "Volkswagen SUV"),
    ("WVW", "Volkswagen"),
    ("XL9", "Spyker"),
    ("XTA", "Lada/AvtoVAZ"),
    ("YK1", "Saab"),
    ("YS3", "Saab"),
    ("YV1", "Volvo"),
    ("YV4", "Volvo SUV"),
    ("ZA9", "Bugatti"),
    ("ZAR", "Alfa Romeo"),
    ("ZFA", "Fiat"),
    ("ZFF", "Ferrari"),
];

/// Position-10 codes in cycle order; index 0 is 1980 (or 2010)
const YEAR_CODES: &[u8; 30] = b"ABCDEFGHJKLMNPRSTVWXY123456789";

const FIRST_CYCLE_START: u16 = 1980;
const SECOND_CYCLE_START: u16 = 2010;

/// Fields decoded from a VIN
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VehicleInfo {
    pub make: Option<String>,
    pub model_year: Option<u16>,
    pub country: Option<String>,
}

/// Decode a VIN into make, model year and country
///
/// Any length other than 17 yields an all-`None` result.
pub fn decode_vin(vin: &str) -> VehicleInfo {
    if vin.len() != VIN_LENGTH || !vin.is_ascii() {
        return VehicleInfo::default();
    }
    let vin = vin.to_ascii_uppercase();

    VehicleInfo {
        make: manufacturer(&vin).map(str::to_string),
        model_year: model_year(&vin),
        country: country(&vin).map(str::to_string),
    }
}

/// WMI lookup: three characters first, then two
fn manufacturer(vin: &str) -> Option<&'static str> {
    let lookup = |prefix: &str| {
        MANUFACTURER_CODES
            .iter()
            .find(|(code, _)| *code == prefix)
            .map(|(_, name)| *name)
    };
    lookup(&vin[..3]).or_else(|| lookup(&vin[..2]))
}

fn model_year(vin: &str) -> Option<u16> {
    let bytes = vin.as_bytes();
    let code = bytes[9];
    let offset = YEAR_CODES.iter().position(|&c| c == code)? as u16;

    let cycle_start = if bytes[6].is_ascii_alphabetic() {
        SECOND_CYCLE_START
    } else {
        FIRST_CYCLE_START
    };
    Some(cycle_start + offset)
}

fn country(vin: &str) -> Option<&'static str> {
    let country = match vin.as_bytes()[0] {
        b'1' | b'4' | b'5' => "United States",
        b'2' => "Canada",
        b'3' => "Mexico",
        b'J' => "Japan",
        b'K' => "Korea",
        b'L' => "China",
        b'S' => "United Kingdom",
        b'T' => "Switzerland/Japan",
        b'V' => "France/Spain",
        b'W' => "Germany",
        b'X' => "Russia/USSR",
        b'Y' => "Belgium/Finland/Sweden",
        b'Z' => "Italy",
        _ => return None,
    };
    Some(country)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_chevrolet() {
        let info = decode_vin("1G1ZT53826F109149");
        assert_eq!(
            info,
            VehicleInfo {
                make: Some("Chevrolet".to_string()),
                model_year: Some(2006),
                country: Some("United States".to_string()),
            }
        );
    }

    #[test]
    fn test_two_character_fallback() {
        // "1GX" is not a three-character WMI, "1G" is
        let info = decode_vin("1GXZT53826F109149");
        assert_eq!(info.make.as_deref(), Some("General Motors (US)"));
    }

    #[test]
    fn test_unknown_wmi() {
        let info = decode_vin("9BWZZZ377VT004251");
        assert_eq!(info.make, None);
        assert_eq!(info.country, None);
    }

    #[test]
    fn test_invalid_length() {
        assert_eq!(decode_vin("1G1ZT53826F10914"), VehicleInfo::default());
        assert_eq!(decode_vin(""), VehicleInfo::default());
        assert_eq!(decode_vin("1G1ZT53826F1091490"), VehicleInfo::default());
    }

    #[test]
    fn test_year_letter_disambiguated_by_position_7() {
        // Position 7 digit -> 1980s cycle
        assert_eq!(decode_vin("WBAAA1305H8251545").model_year, Some(1987));
        // Position 7 letter -> 2010s cycle
        assert_eq!(decode_vin("5YJSA1E26HF000337").model_year, Some(2017));
    }

    #[test]
    fn test_year_unknown_code() {
        // 'U' is never used at position 10
        assert_eq!(decode_vin("1G1ZT5382UF109149").model_year, None);
    }

    #[test]
    fn test_lowercase_vin() {
        let info = decode_vin("wvwzzz1kz6w000001");
        assert_eq!(info.make.as_deref(), Some("Volkswagen"));
        assert_eq!(info.country.as_deref(), Some("Germany"));
    }
}
