//! Alternative ZIP planner.
//!
//! Single pass, no retries:
//!   1. validate ZIP and dates
//!   2. original ZIP has room -> done, no geocoding
//!   3. geocode original ZIP (miss -> done, nothing to search around)
//!   4. radius search over the directory
//!   5. capacity-check the nearest candidates concurrently
//!   6. keep available ones in distance order
//!
//! Nothing here returns an error. Every failure degrades to a result with
//! `original` filled in and a `status` saying why the lists are short.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::capacity::{CapacitySnapshot, CapacityStore};
use crate::dates;
use crate::directory::ZipDirectory;
use crate::geocode::GeoResolver;
use crate::radius::{find_within_radius, NearbyZip};
use crate::zipcode;
use crate::{MAX_CANDIDATES, MAX_DIAGNOSTICS, MAX_SUGGESTIONS, SEARCH_RADIUS_MILES};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerOptions {
    pub radius_miles: f64,
    /// Nearest candidates whose capacity is checked
    pub max_candidates: usize,
    pub max_suggestions: usize,
    pub max_diagnostics: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            radius_miles: SEARCH_RADIUS_MILES,
            max_candidates: MAX_CANDIDATES,
            max_suggestions: MAX_SUGGESTIONS,
            max_diagnostics: MAX_DIAGNOSTICS,
        }
    }
}

/// One ZIP with its capacity and distance from the requested ZIP
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipAlternative {
    pub zip: String,
    pub available: bool,
    pub capacity: u32,
    pub reserved: u32,
    pub distance_miles: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ZipAlternative {
    fn from_snapshot(snap: CapacitySnapshot, distance_miles: f64) -> Self {
        Self {
            available: snap.available(),
            zip: snap.zip,
            capacity: snap.capacity,
            reserved: snap.reserved,
            distance_miles,
            city: None,
            state: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum SuggestionStatus {
    /// The requested ZIP has room; no search ran
    Available,
    /// The requested ZIP is full; search ran (the list may still be empty)
    Alternatives,
    InvalidInput(String),
    /// Requested ZIP could not be placed on the map
    GeocodeUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeSuggestionResult {
    pub original: String,
    pub status: SuggestionStatus,
    /// Available candidates, nearest first, capped at `max_suggestions`
    pub alternatives: Vec<ZipAlternative>,
    /// Checked candidates, available or not, capped at `max_diagnostics`
    pub within_radius: Vec<ZipAlternative>,
}

impl AlternativeSuggestionResult {
    fn empty(original: &str, status: SuggestionStatus) -> Self {
        Self {
            original: original.to_string(),
            status,
            alternatives: Vec::new(),
            within_radius: Vec::new(),
        }
    }

    fn invalid(original: &str, reason: String) -> Self {
        Self::empty(original, SuggestionStatus::InvalidInput(reason))
    }
}

pub struct AlternativeZipPlanner {
    resolver: GeoResolver,
    store: Arc<dyn CapacityStore>,
    directory: Arc<ZipDirectory>,
    options: PlannerOptions,
}

impl AlternativeZipPlanner {
    pub fn new(
        resolver: GeoResolver,
        store: Arc<dyn CapacityStore>,
        directory: Arc<ZipDirectory>,
    ) -> Self {
        Self {
            resolver,
            store,
            directory,
            options: PlannerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PlannerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// String-date entry point matching the HTTP-facing shape
    pub async fn suggest_iso<S: AsRef<str>>(
        &self,
        zip: &str,
        dates: &[S],
    ) -> AlternativeSuggestionResult {
        match dates::parse_dates(dates) {
            Ok(parsed) => self.suggest(zip, &parsed).await,
            Err(e) => AlternativeSuggestionResult::invalid(zip, e.to_string()),
        }
    }

    pub async fn suggest(&self, zip: &str, dates: &[NaiveDate]) -> AlternativeSuggestionResult {
        let Some(requested) = zipcode::parse_zip(zip) else {
            let reason = format!("'{}' is not a 5-digit ZIP code", zip);
            return AlternativeSuggestionResult::invalid(zip, reason);
        };
        if dates.is_empty() {
            let reason = "at least one date is required".to_string();
            return AlternativeSuggestionResult::invalid(zip, reason);
        }
        let dates = dates::normalize(dates);

        let original = self.check(&requested, &dates).await;
        if original.available() {
            info!(zip = %requested, remaining = original.remaining(), "requested zip has capacity");
            let mut alt = ZipAlternative::from_snapshot(original, 0.0);
            self.attach_place(&mut alt);
            return AlternativeSuggestionResult {
                original: zip.to_string(),
                status: SuggestionStatus::Available,
                alternatives: Vec::new(),
                within_radius: vec![alt],
            };
        }

        let Some(center) = self.resolver.resolve(&requested).await else {
            warn!(zip = %requested, "requested zip is full and could not be geocoded");
            return AlternativeSuggestionResult::empty(zip, SuggestionStatus::GeocodeUnavailable);
        };

        let mut nearby = find_within_radius(
            center,
            self.directory.locations(),
            self.options.radius_miles,
            Some(&requested),
        );
        nearby.truncate(self.options.max_candidates);

        // join_all yields results in input order, whatever order they finish in
        let checks = nearby.into_iter().map(|n| self.check_candidate(n, &dates));
        let checked: Vec<ZipAlternative> = join_all(checks).await;

        let alternatives: Vec<ZipAlternative> = checked
            .iter()
            .filter(|a| a.available)
            .take(self.options.max_suggestions)
            .cloned()
            .collect();
        let within_radius: Vec<ZipAlternative> = checked
            .into_iter()
            .take(self.options.max_diagnostics)
            .collect();

        info!(
            zip = %requested,
            checked = within_radius.len(),
            found = alternatives.len(),
            "requested zip is full, searched alternatives"
        );

        AlternativeSuggestionResult {
            original: zip.to_string(),
            status: SuggestionStatus::Alternatives,
            alternatives,
            within_radius,
        }
    }

    /// Fail-closed capacity read
    async fn check(&self, zip: &str, dates: &[NaiveDate]) -> CapacitySnapshot {
        match self.store.capacity(zip, dates).await {
            Ok(snap) => snap,
            Err(e) => {
                warn!(zip, error = %e, "capacity lookup failed, treating as full");
                CapacitySnapshot::unknown(zip)
            }
        }
    }

    async fn check_candidate(&self, nearby: NearbyZip, dates: &[NaiveDate]) -> ZipAlternative {
        let snap = self.check(&nearby.location.zip, dates).await;
        let mut alt = ZipAlternative::from_snapshot(snap, nearby.distance_miles);
        alt.city = nearby.location.city;
        alt.state = nearby.location.state;
        alt
    }

    fn attach_place(&self, alt: &mut ZipAlternative) {
        if let Some(loc) = self.directory.get(&alt.zip) {
            alt.city = loc.city.clone();
            alt.state = loc.state.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::InMemoryCapacityStore;
    use crate::geo::GeoCoordinate;
    use crate::geocode::{GeocodeCache, MockGeocoder};
    use crate::zipcode::ZipLocation;

    fn d(s: &str) -> NaiveDate {
        dates::parse_date(s).unwrap()
    }

    fn sf(zip: &str, lat: f64, lon: f64) -> ZipLocation {
        let loc = ZipLocation::new(zip, lat, lon);
        loc.with_place("San Francisco", "CA")
    }

    fn center() -> GeoCoordinate {
        GeoCoordinate::new(37.7749, -122.4194).unwrap()
    }

    fn directory() -> Arc<ZipDirectory> {
        Arc::new(ZipDirectory::new(vec![
            sf("94102", 37.7749, -122.4194),
            sf("94103", 37.7716, -122.4094),
            sf("94133", 37.8025, -122.4093),
        ]))
    }

    fn planner(mock: MockGeocoder, store: InMemoryCapacityStore) -> AlternativeZipPlanner {
        let resolver = GeoResolver::new(Arc::new(mock), Arc::new(GeocodeCache::default()));
        AlternativeZipPlanner::new(resolver, Arc::new(store), directory())
    }

    #[tokio::test]
    async fn available_original_skips_geocoding() {
        let mut mock = MockGeocoder::new();
        mock.expect_geocode().times(0);
        let store = InMemoryCapacityStore::new();
        store.set_capacity("94102", 10);
        store.set_reserved("94102", d("2025-06-01"), 3);

        let days = [d("2025-06-01")];
        let result = planner(mock, store).suggest("94102", &days).await;
        assert_eq!(result.status, SuggestionStatus::Available);
        assert!(result.alternatives.is_empty());
        assert_eq!(result.within_radius.len(), 1);
        let own = &result.within_radius[0];
        assert_eq!(own.reserved, 3);
        assert_eq!(own.distance_miles, 0.0);
        assert_eq!(own.city.as_deref(), Some("San Francisco"));
    }

    #[tokio::test]
    async fn invalid_zip_does_no_io() {
        let mut mock = MockGeocoder::new();
        mock.expect_geocode().times(0);
        let p = planner(mock, InMemoryCapacityStore::new());

        let result = p.suggest("abc", &[d("2025-06-01")]).await;
        assert_eq!(result.original, "abc");
        assert!(matches!(result.status, SuggestionStatus::InvalidInput(_)));
        assert!(result.alternatives.is_empty());
        assert!(result.within_radius.is_empty());

        let no_dates = p.suggest("94102", &[]).await;
        assert!(matches!(no_dates.status, SuggestionStatus::InvalidInput(_)));

        let bad_date = p.suggest_iso("94102", &["June 1st"]).await;
        assert!(matches!(bad_date.status, SuggestionStatus::InvalidInput(_)));
    }

    #[tokio::test]
    async fn plus_four_is_accepted_and_original_echoed() {
        let mut mock = MockGeocoder::new();
        mock.expect_geocode()
            .withf(|text| text == "94102")
            .times(1)
            .returning(|_| Ok(Some(center())));
        let store = InMemoryCapacityStore::new();
        store.set_capacity("94103", 10);

        let days = [d("2025-06-01")];
        let result = planner(mock, store).suggest("94102-4411", &days).await;
        assert_eq!(result.original, "94102-4411");
        assert_eq!(result.status, SuggestionStatus::Alternatives);
        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(result.alternatives[0].zip, "94103");
        // 94102 itself never shows up as its own alternative
        assert!(result.within_radius.iter().all(|a| a.zip != "94102"));
    }

    #[tokio::test]
    async fn limits_apply() {
        let mut mock = MockGeocoder::new();
        mock.expect_geocode().returning(|_| Ok(Some(center())));
        let store = InMemoryCapacityStore::new();
        store.set_capacity("94103", 10);
        store.set_capacity("94133", 10);

        let opts = PlannerOptions {
            max_candidates: 2,
            max_suggestions: 1,
            max_diagnostics: 1,
            ..PlannerOptions::default()
        };
        let p = planner(mock, store).with_options(opts);
        let result = p.suggest("94102", &[d("2025-06-01")]).await;
        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(result.within_radius.len(), 1);
        assert_eq!(result.alternatives[0].zip, "94103");
    }

    #[test]
    fn json_shape() {
        let result = AlternativeSuggestionResult {
            original: "94102".into(),
            status: SuggestionStatus::Alternatives,
            alternatives: vec![ZipAlternative {
                zip: "94103".into(),
                available: true,
                capacity: 10,
                reserved: 7,
                distance_miles: 0.6,
                city: Some("San Francisco".into()),
                state: None,
            }],
            within_radius: vec![],
        };
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["original"], "94102");
        assert_eq!(v["status"]["kind"], "alternatives");
        assert_eq!(v["alternatives"][0]["distanceMiles"], 0.6);
        assert!(v["alternatives"][0].get("state").is_none());
        assert!(v["withinRadius"].as_array().unwrap().is_empty());

        let status = SuggestionStatus::InvalidInput("bad".into());
        let invalid = serde_json::to_value(status).unwrap();
        assert_eq!(invalid["kind"], "invalid_input");
        assert_eq!(invalid["reason"], "bad");
    }
}
