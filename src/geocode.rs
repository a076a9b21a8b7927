//! Location text -> coordinate resolution.
//!
//! `GeoResolver` fronts a swappable `Geocoder` provider with a TTL cache.
//! Every provider failure (error, timeout, no result) collapses to `None`;
//! callers read that as "coordinates unavailable".
//!
//! Providers:
//!   - `GoogleGeocoder`  Google Geocoding API over ureq (feature "google")
//!   - `ZipDbGeocoder`   offline binary ZIP database
//!   - `ZipDirectory`    in-memory reference directory (see directory.rs)

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GeocodeError;
use crate::geo::GeoCoordinate;
use crate::now_epoch;
use crate::zipcode;
use crate::zipdb;
use crate::{GEOCODE_CACHE_MAX_ENTRIES, GEOCODE_TIMEOUT_SEC, GEOCODE_TTL_SEC, MIN_GEOCODE_LEN};

/// External geocoding provider.
///
/// `Ok(None)` means the provider answered but found nothing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, text: &str) -> Result<Option<GeoCoordinate>, GeocodeError>;
}

/// Cache key: trimmed, lowercased location text
pub fn cache_key(text: &str) -> String {
    text.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub coordinate: GeoCoordinate,
    pub cached_at: i64,
}

/// Persisted form of one cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    #[serde(flatten)]
    pub entry: CacheEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatEntry {
    pub location: String,
    pub coordinate: GeoCoordinate,
    pub age_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub entries: Vec<CacheStatEntry>,
}

/// Bounded geocode cache with lazy TTL eviction.
///
/// Stale entries are removed when looked up, never swept. When full, an
/// insert of a new key evicts the oldest entry. Writes are last-write-wins.
///
/// Reads go straight to the map. Every write holds `by_age`, so the size
/// check, the eviction and the insert happen as one step and the bound is
/// never exceeded.
#[derive(Debug)]
pub struct GeocodeCache {
    entries: DashMap<String, CacheEntry>,
    // (cached_at, key) for every entry in `entries`
    by_age: Mutex<BTreeSet<(i64, String)>>,
    ttl_secs: i64,
    max_entries: usize,
}

impl Default for GeocodeCache {
    fn default() -> Self {
        Self::new(GEOCODE_TTL_SEC, GEOCODE_CACHE_MAX_ENTRIES)
    }
}

impl GeocodeCache {
    pub fn new(ttl_secs: i64, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            by_age: Mutex::new(BTreeSet::new()),
            ttl_secs,
            max_entries: max_entries.max(1),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: i64) -> bool {
        now - entry.cached_at < self.ttl_secs
    }

    /// Fresh coordinate for `key`; a stale entry is evicted on the way
    pub fn get(&self, key: &str, now: i64) -> Option<GeoCoordinate> {
        let entry = *self.entries.get(key)?;
        if self.is_fresh(&entry, now) {
            return Some(entry.coordinate);
        }

        let mut by_age = self.by_age.lock();
        let removed = self.entries.remove_if(key, |_, e| !self.is_fresh(e, now));
        if let Some((key, stale)) = removed {
            by_age.remove(&(stale.cached_at, key));
        }
        None
    }

    pub fn insert(&self, key: String, coordinate: GeoCoordinate, now: i64) {
        let mut by_age = self.by_age.lock();
        let previous = self.entries.get(&key).map(|e| e.cached_at);
        match previous {
            Some(cached_at) => {
                by_age.remove(&(cached_at, key.clone()));
            }
            None => {
                while self.entries.len() >= self.max_entries {
                    let Some((_, oldest)) = by_age.pop_first() else {
                        break;
                    };
                    self.entries.remove(&oldest);
                }
            }
        }

        by_age.insert((now, key.clone()));
        let entry = CacheEntry {
            coordinate,
            cached_at: now,
        };
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        let mut by_age = self.by_age.lock();
        self.entries.clear();
        by_age.clear();
    }

    pub fn stats(&self, now: i64) -> CacheStats {
        let mut entries: Vec<CacheStatEntry> = self
            .entries
            .iter()
            .map(|e| CacheStatEntry {
                location: e.key().clone(),
                coordinate: e.value().coordinate,
                age_secs: now - e.value().cached_at,
            })
            .collect();
        entries.sort_by(|a, b| a.location.cmp(&b.location));
        CacheStats {
            size: entries.len(),
            entries,
        }
    }

    /// All entries, stale ones included, sorted by key
    pub fn records(&self) -> Vec<CacheRecord> {
        let mut out: Vec<CacheRecord> = self
            .entries
            .iter()
            .map(|e| CacheRecord {
                key: e.key().clone(),
                entry: *e.value(),
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Loads persisted records, keeping each record's original timestamp
    pub fn restore(&self, records: Vec<CacheRecord>) {
        for CacheRecord { key, entry } in records {
            if entry.coordinate.is_valid() {
                self.insert(key, entry.coordinate, entry.cached_at);
            }
        }
    }
}

/// Cached, time-bounded front for a `Geocoder`
#[derive(Clone)]
pub struct GeoResolver {
    provider: Arc<dyn Geocoder>,
    cache: Arc<GeocodeCache>,
    timeout: Duration,
    clock: fn() -> i64,
}

impl GeoResolver {
    pub fn new(provider: Arc<dyn Geocoder>, cache: Arc<GeocodeCache>) -> Self {
        Self {
            provider,
            cache,
            timeout: Duration::from_secs(GEOCODE_TIMEOUT_SEC),
            clock: now_epoch,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    pub async fn resolve(&self, location: &str) -> Option<GeoCoordinate> {
        let key = cache_key(location);
        if key.chars().count() < MIN_GEOCODE_LEN {
            debug!(location, "too short to geocode");
            return None;
        }

        let now = (self.clock)();
        if let Some(coordinate) = self.cache.get(&key, now) {
            debug!(key = %key, "geocode cache hit");
            return Some(coordinate);
        }
        debug!(key = %key, "geocode cache miss");

        let lookup = self.provider.geocode(location);
        let result = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(r) => r,
            Err(_) => Err(GeocodeError::Timeout(self.timeout.as_secs())),
        };

        match result {
            Ok(Some(coordinate)) if coordinate.is_valid() => {
                self.cache.insert(key, coordinate, (self.clock)());
                Some(coordinate)
            }
            Ok(Some(coordinate)) => {
                warn!(location, ?coordinate, "provider returned out-of-range coordinate");
                None
            }
            Ok(None) => {
                debug!(location, "no geocode result");
                None
            }
            Err(e) => {
                warn!(location, error = %e, "geocode failed");
                None
            }
        }
    }
}

/// Offline lookups against the binary ZIP database. Non-ZIP text finds nothing.
pub struct ZipDbGeocoder {
    db_path: PathBuf,
}

impl ZipDbGeocoder {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl Geocoder for ZipDbGeocoder {
    async fn geocode(&self, text: &str) -> Result<Option<GeoCoordinate>, GeocodeError> {
        let Some(zip) = zipcode::parse_zip(text) else {
            return Ok(None);
        };
        let path = self.db_path.clone();
        let task = tokio::task::spawn_blocking(move || zipdb::lookup(&path, &zip));
        Ok(task.await??)
    }
}

#[cfg(feature = "google")]
pub use google::GoogleGeocoder;

#[cfg(feature = "google")]
mod google {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::Geocoder;
    use crate::error::GeocodeError;
    use crate::geo::GeoCoordinate;
    use crate::zipcode;

    const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

    /// Google Geocoding API client.
    ///
    /// Blocking ureq call on tokio's blocking pool. Bare ZIP queries get a
    /// country suffix ("94102,US") so the API doesn't match foreign postcodes.
    pub struct GoogleGeocoder {
        api_key: Option<String>,
        country: String,
        agent: ureq::Agent,
    }

    impl GoogleGeocoder {
        pub fn new(api_key: Option<String>, country: &str, timeout: Duration) -> Self {
            let agent = ureq::AgentBuilder::new()
                .timeout(timeout)
                .user_agent(concat!("adreach/", env!("CARGO_PKG_VERSION")))
                .build();
            Self {
                api_key: api_key.filter(|k| !k.is_empty()),
                country: country_code(country),
                agent,
            }
        }

        fn query(&self, text: &str) -> String {
            match zipcode::parse_zip(text) {
                Some(zip) if !self.country.is_empty() => format!("{zip},{}", self.country),
                _ => text.to_string(),
            }
        }
    }

    fn country_code(country: &str) -> String {
        country.trim().to_uppercase().chars().take(2).collect()
    }

    /// First result of a Geocoding API response body
    pub(super) fn parse_response(
        resp: &serde_json::Value,
    ) -> Result<Option<GeoCoordinate>, GeocodeError> {
        let status = resp["status"].as_str().unwrap_or("");
        match status {
            "OK" => {}
            "ZERO_RESULTS" => return Ok(None),
            other => return Err(GeocodeError::Status(other.to_string())),
        }

        let location = &resp["results"][0]["geometry"]["location"];
        match (location["lat"].as_f64(), location["lng"].as_f64()) {
            (Some(latitude), Some(longitude)) => {
                let coordinate = GeoCoordinate {
                    latitude,
                    longitude,
                };
                Ok(Some(coordinate))
            }
            _ => Err(GeocodeError::Parse("missing geometry.location".into())),
        }
    }

    fn fetch(
        agent: &ureq::Agent,
        address: &str,
        key: &str,
    ) -> Result<serde_json::Value, GeocodeError> {
        agent
            .get(GEOCODE_URL)
            .query("address", address)
            .query("key", key)
            .call()
            .map_err(|e| GeocodeError::Http(e.to_string()))?
            .into_json()
            .map_err(|e| GeocodeError::Parse(e.to_string()))
    }

    #[async_trait]
    impl Geocoder for GoogleGeocoder {
        async fn geocode(&self, text: &str) -> Result<Option<GeoCoordinate>, GeocodeError> {
            let Some(key) = self.api_key.clone() else {
                tracing::warn!("GOOGLE_MAPS_API_KEY not configured, geocoding disabled");
                return Ok(None);
            };
            let agent = self.agent.clone();
            let address = self.query(text);

            let task = tokio::task::spawn_blocking(move || fetch(&agent, &address, &key));
            let resp = task.await??;

            parse_response(&resp)
        }
    }

}
