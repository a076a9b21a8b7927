//! Great-circle distance between coordinates.
//!
//! Haversine formula on a spherical Earth (R = 3959 mi). Accurate to well
//! under 0.5% at ad-radius scales, which is all the planner needs.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::EARTH_RADIUS_MILES;

const FEET_PER_MILE: f64 = 5280.0;

fn deg2rad(d: f64) -> f64 {
    d * PI / 180.0
}

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    /// Validated constructor. Rejects non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            let msg = format!("latitude {latitude} out of range [-90, 90]");
            return Err(Error::InvalidInput(msg));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            let msg = format!("longitude {longitude} out of range [-180, 180]");
            return Err(Error::InvalidInput(msg));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn is_valid(&self) -> bool {
        Self::new(self.latitude, self.longitude).is_ok()
    }
}

/// Haversine distance in miles
pub fn distance_miles(a: GeoCoordinate, b: GeoCoordinate) -> f64 {
    let phi1 = deg2rad(a.latitude);
    let phi2 = deg2rad(b.latitude);
    let d_phi = deg2rad(b.latitude - a.latitude);
    let d_lambda = deg2rad(b.longitude - a.longitude);

    let lat_term = (d_phi / 2.0).sin().powi(2);
    let lon_term = phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let h = lat_term + lon_term;
    // Rounding can push h a hair past 1.0 for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_MILES * c
}

/// "850 ft" under a mile, "3.2 mi" otherwise
pub fn format_distance(miles: f64) -> String {
    if miles < 1.0 {
        format!("{:.0} ft", miles * FEET_PER_MILE)
    } else {
        format!("{:.1} mi", miles)
    }
}

pub fn coverage_description(zip: &str, radius_miles: f64) -> String {
    format!("Your ad will reach users within {radius_miles} miles of {zip}")
}
