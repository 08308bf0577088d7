//! Minimal NMEA 0183 Parsing
//!
//! Only the two sentences needed for a position stream:
//! - RMC: fix status, position, speed over ground, course
//! - GGA: fix quality, satellites, HDOP, altitude

/// Knots to metres per second
const KNOTS_TO_MPS: f64 = 0.514_444;

/// Recommended minimum data
#[derive(Debug, Clone, PartialEq)]
pub struct Rmc {
    /// Status `A` (active); `V` means no valid fix
    pub valid: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Speed over ground (m/s)
    pub speed: Option<f64>,
    /// Course over ground (degrees true)
    pub course: Option<f64>,
}

/// Fix data
#[derive(Debug, Clone, PartialEq)]
pub struct Gga {
    pub fix_quality: u8,
    pub satellites: Option<u8>,
    pub hdop: Option<f64>,
    /// Altitude above mean sea level (m)
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Rmc(Rmc),
    Gga(Gga),
}

/// Parse one NMEA line; unknown sentences and bad checksums yield `None`
pub fn parse_sentence(line: &str) -> Option<Sentence> {
    let line = line.trim();
    if !line.starts_with('$') || !checksum_ok(line) {
        return None;
    }

    let body = line[1..].split('*').next()?;
    let parts: Vec<&str> = body.split(',').collect();
    let talker = parts.first()?;
    if talker.len() < 5 {
        return None;
    }

    match talker.get(2..)? {
        "RMC" if parts.len() >= 9 => Some(Sentence::Rmc(Rmc {
            valid: parts[2] == "A",
            latitude: parse_coordinate(parts[3], parts[4]),
            longitude: parse_coordinate(parts[5], parts[6]),
            speed: parts[7].parse::<f64>().ok().map(|knots| knots * KNOTS_TO_MPS),
            course: parts[8].parse().ok(),
        })),
        "GGA" if parts.len() >= 10 => Some(Sentence::Gga(Gga {
            fix_quality: parts[6].parse().unwrap_or(0),
            satellites: parts[7].parse().ok(),
            hdop: parts[8].parse().ok(),
            altitude: parts[9].parse().ok(),
        })),
        _ => None,
    }
}

/// Check the `*hh` XOR checksum when one is present
fn checksum_ok(line: &str) -> bool {
    let Some((body, checksum)) = line[1..].split_once('*') else {
        return true;
    };
    let Ok(expected) = u8::from_str_radix(checksum.trim(), 16) else {
        return false;
    };
    body.bytes().fold(0u8, |acc, b| acc ^ b) == expected
}

/// Convert `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere to decimal degrees
pub fn parse_coordinate(value: &str, hemisphere: &str) -> Option<f64> {
    if value.is_empty() || hemisphere.is_empty() {
        return None;
    }
    let deg_len = match hemisphere {
        "N" | "S" => 2,
        "E" | "W" => 3,
        _ => return None,
    };
    if value.len() < deg_len + 2 {
        return None;
    }

    let degrees: f64 = value.get(..deg_len)?.parse().ok()?;
    let minutes: f64 = value.get(deg_len..)?.parse().ok()?;
    let decimal = degrees + minutes / 60.0;

    Some(if matches!(hemisphere, "S" | "W") {
        -decimal
    } else {
        decimal
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmc_active_fix() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
        let Some(Sentence::Rmc(rmc)) = parse_sentence(line) else {
            panic!("expected RMC");
        };
        assert!(rmc.valid);
        assert!((rmc.latitude.unwrap() - 48.1173).abs() < 1e-4);
        assert!((rmc.longitude.unwrap() - 11.516_667).abs() < 1e-4);
        assert!((rmc.speed.unwrap() - 22.4 * KNOTS_TO_MPS).abs() < 1e-6);
        assert_eq!(rmc.course, Some(84.4));
    }

    #[test]
    fn test_rmc_void_fix() {
        let line = "$GNRMC,001031.00,V,,,,,,,060180,,,N";
        let Some(Sentence::Rmc(rmc)) = parse_sentence(line) else {
            panic!("expected RMC");
        };
        assert!(!rmc.valid);
        assert_eq!(rmc.latitude, None);
        assert_eq!(rmc.longitude, None);
    }

    #[test]
    fn test_gga() {
        let line = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
        let Some(Sentence::Gga(gga)) = parse_sentence(line) else {
            panic!("expected GGA");
        };
        assert_eq!(gga.fix_quality, 1);
        assert_eq!(gga.satellites, Some(8));
        assert_eq!(gga.hdop, Some(0.9));
        assert_eq!(gga.altitude, Some(545.4));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*00";
        assert_eq!(parse_sentence(line), None);
    }

    #[test]
    fn test_southern_western_hemisphere() {
        assert!((parse_coordinate("3407.1234", "S").unwrap() + 34.118_723).abs() < 1e-5);
        assert!((parse_coordinate("11823.4567", "W").unwrap() + 118.390_945).abs() < 1e-5);
        assert_eq!(parse_coordinate("12", "N"), None);
        assert_eq!(parse_coordinate("4807.038", "X"), None);
    }

    #[test]
    fn test_other_sentences_ignored() {
        assert_eq!(parse_sentence("$GPGSV,3,1,11,03,03,111,00*74"), None);
        assert_eq!(parse_sentence("garbage"), None);
    }
}
