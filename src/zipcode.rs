//! US ZIP code validation and the ZIP location record.

use serde::{Deserialize, Serialize};

use crate::geo::GeoCoordinate;

/// A ZIP code with its centroid and optional place name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipLocation {
    pub zip: String,
    #[serde(flatten)]
    pub coordinate: GeoCoordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ZipLocation {
    pub fn new(zip: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            zip: normalize_zip(zip),
            coordinate: GeoCoordinate {
                latitude,
                longitude,
            },
            city: None,
            state: None,
        }
    }

    pub fn with_place(mut self, city: &str, state: &str) -> Self {
        self.city = Some(city.to_string());
        self.state = Some(state.to_string());
        self
    }
}

/// `12345` or `12345-6789`
pub fn is_valid_zip(zip: &str) -> bool {
    let b = zip.as_bytes();
    let digits = |s: &[u8]| s.iter().all(u8::is_ascii_digit);
    match b.len() {
        5 => digits(b),
        10 => digits(&b[..5]) && b[5] == b'-' && digits(&b[6..]),
        _ => false,
    }
}

/// Strip everything but digits and keep the first five
pub fn normalize_zip(zip: &str) -> String {
    zip.chars().filter(char::is_ascii_digit).take(5).collect()
}

/// Validate then normalize. ZIP+4 is truncated to the 5-digit code.
pub fn parse_zip(zip: &str) -> Option<String> {
    let trimmed = zip.trim();
    if is_valid_zip(trimmed) {
        Some(normalize_zip(trimmed))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_five_and_plus_four() {
        assert!(is_valid_zip("94102"));
        assert!(is_valid_zip("94102-1234"));
        assert!(!is_valid_zip("9410"));
        assert!(!is_valid_zip("941021"));
        assert!(!is_valid_zip("abc"));
        assert!(!is_valid_zip("94102 1234"));
        assert!(!is_valid_zip("94102-12a4"));
        assert!(!is_valid_zip(""));
    }

    #[test]
    fn plus_four_truncates() {
        assert_eq!(parse_zip(" 94102-1234 ").as_deref(), Some("94102"));
        assert_eq!(parse_zip("abc"), None);
        assert_eq!(normalize_zip("9-4-1-0-2-9"), "94102");
    }

    #[test]
    fn location_json_is_flat() {
        let loc = ZipLocation::new("94103", 37.7716, -122.4094)
            .with_place("San Francisco", "CA");
        let v = serde_json::to_value(&loc).unwrap();
        assert_eq!(v["zip"], "94103");
        assert_eq!(v["latitude"], 37.7716);
        assert_eq!(v["city"], "San Francisco");

        let json = r#"{"zip":"10001","latitude":40.75,"longitude":-73.99}"#;
        let back: ZipLocation = serde_json::from_str(json).unwrap();
        assert_eq!(back.city, None);
        assert_eq!(back.coordinate.longitude, -73.99);
    }
}
