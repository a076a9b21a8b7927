//! adreach - ZIP-radius ad inventory planner
//!
//! Given an advertiser's ZIP code and campaign dates, checks whether that ZIP
//! has free ad slots and, when it does not, suggests nearby ZIP codes that do.
//!
//! Pipeline:
//!   requested ZIP -> capacity check -> geocode -> radius search
//!   -> concurrent candidate capacity checks -> ranked alternatives

pub mod capacity;
pub mod config;
pub mod dates;
pub mod directory;
pub mod error;
pub mod geo;
pub mod geocode;
pub mod planner;
pub mod prefs;
pub mod radius;
pub mod zipcode;
pub mod zipdb;

pub use capacity::{CapacitySnapshot, CapacityStore, InMemoryCapacityStore};
pub use directory::ZipDirectory;
pub use error::{CapacityError, Error, GeocodeError};
pub use geo::{distance_miles, GeoCoordinate};
pub use geocode::{GeoResolver, GeocodeCache, Geocoder};
pub use planner::{AlternativeSuggestionResult, AlternativeZipPlanner, PlannerOptions};
pub use planner::{SuggestionStatus, ZipAlternative};
pub use radius::{find_within_radius, NearbyZip};
pub use zipcode::ZipLocation;

/// Earth's mean radius (miles)
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Coverage radius an ad targeted at a ZIP is visible within (miles)
pub const SEARCH_RADIUS_MILES: f64 = 20.0;

/// Planner bounds
pub const MAX_CANDIDATES: usize = 15;
pub const MAX_SUGGESTIONS: usize = 5;
pub const MAX_DIAGNOSTICS: usize = 10;

/// Geocoding
pub const GEOCODE_TTL_SEC: i64 = 7 * 24 * 60 * 60; // 7 days
pub const GEOCODE_TIMEOUT_SEC: u64 = 5;
pub const GEOCODE_CACHE_MAX_ENTRIES: usize = 10_000;
pub const MIN_GEOCODE_LEN: usize = 3;

/// Longest span accepted for a per-day availability report
pub const MAX_RANGE_DAYS: i64 = 366;

pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
