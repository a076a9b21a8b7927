//! Advertiser preference blob.
//!
//! Free-form JSON object with a small set of recognized keys. Recognized keys
//! are typed; anything else is carried through untouched and never read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::zipcode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_miles: Option<f64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Preferences {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Two-letter uppercase country, also accepting a legacy `country` key
    pub fn country(&self) -> Option<String> {
        let raw = self
            .country_code
            .as_deref()
            .or_else(|| self.other.get("country").and_then(Value::as_str))?;
        let cc: String = raw.trim().to_uppercase().chars().take(2).collect();
        (!cc.is_empty()).then_some(cc)
    }

    pub fn zip(&self) -> Option<String> {
        self.zip_code.as_deref().and_then(zipcode::parse_zip)
    }

    /// Positive, finite radius only
    pub fn radius(&self) -> Option<f64> {
        self.radius_miles.filter(|r| r.is_finite() && *r > 0.0)
    }
}
