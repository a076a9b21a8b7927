//! Ad slot capacity per ZIP per day.
//!
//! The store contract is one read: how many slots a ZIP has on a date and how
//! many are taken. A multi-day campaign is only as available as its worst day,
//! so range queries report the most constrained date.
//!
//! Unknown ZIPs are fail-closed: `{capacity: 0, reserved: 0}`, never
//! available. Over-booked days (`reserved > capacity`) count as zero room.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dates;
use crate::error::CapacityError;

/// Slot counts for one ZIP over a date or date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub zip: String,
    pub capacity: u32,
    pub reserved: u32,
}

impl CapacitySnapshot {
    pub fn new(zip: &str, capacity: u32, reserved: u32) -> Self {
        Self {
            zip: zip.to_string(),
            capacity,
            reserved,
        }
    }

    /// Fail-closed placeholder for unknown ZIPs and failed lookups
    pub fn unknown(zip: &str) -> Self {
        Self::new(zip, 0, 0)
    }

    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.reserved)
    }

    /// Strictly below capacity; a full ZIP is not available
    pub fn available(&self) -> bool {
        self.reserved < self.capacity
    }
}

/// Slots on a single date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaySlots {
    pub capacity: u32,
    pub reserved: u32,
}

impl DaySlots {
    pub fn room(&self) -> u32 {
        self.capacity.saturating_sub(self.reserved)
    }
}

#[async_trait]
pub trait CapacityStore: Send + Sync {
    /// Slots for one ZIP on one date. Unknown ZIPs report zero capacity.
    async fn day_slots(&self, zip: &str, date: NaiveDate) -> Result<DaySlots, CapacityError>;

    /// Most constrained day across `dates`. Ties go to the earliest date.
    async fn capacity(
        &self,
        zip: &str,
        dates: &[NaiveDate],
    ) -> Result<CapacitySnapshot, CapacityError> {
        let mut worst: Option<DaySlots> = None;
        for &date in &dates::normalize(dates) {
            let day = self.day_slots(zip, date).await?;
            if worst.map_or(true, |w| day.room() < w.room()) {
                worst = Some(day);
            }
        }
        Ok(match worst {
            Some(day) => CapacitySnapshot::new(zip, day.capacity, day.reserved),
            None => CapacitySnapshot::unknown(zip),
        })
    }
}

/// One row of a per-day availability report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub capacity: u32,
    pub slots_used: u32,
    pub slots_remaining: u32,
    pub available: bool,
}

/// Status of every date in `from..=to`
pub async fn availability_report(
    store: &dyn CapacityStore,
    zip: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DayAvailability>, CapacityError> {
    let Ok(days) = dates::expand_range(from, to) else {
        let range = CapacityError::InvalidRange {
            from: from.to_string(),
            to: to.to_string(),
        };
        return Err(range);
    };

    let mut out = Vec::with_capacity(days.len());
    for date in days {
        let day = store.day_slots(zip, date).await?;
        out.push(DayAvailability {
            date,
            capacity: day.capacity,
            slots_used: day.reserved,
            slots_remaining: day.room(),
            available: day.reserved < day.capacity,
        });
    }
    Ok(out)
}

/// Inventory for one ZIP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZipInventory {
    /// Slots per day unless overridden
    pub capacity: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub daily_capacity: BTreeMap<NaiveDate, u32>,
    /// Reservations imported as bare counts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reserved: BTreeMap<NaiveDate, u32>,
    /// Ad ids holding a slot, one per ad per date
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bookings: BTreeMap<NaiveDate, BTreeSet<String>>,
}

impl ZipInventory {
    fn day(&self, date: NaiveDate) -> DaySlots {
        let capacity = *self.daily_capacity.get(&date).unwrap_or(&self.capacity);
        let counted = self.reserved.get(&date).copied().unwrap_or(0);
        let booked = self.bookings.get(&date).map_or(0, |b| b.len() as u32);
        DaySlots {
            capacity,
            reserved: counted.saturating_add(booked),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    zips: BTreeMap<String, ZipInventory>,
}

/// Result of a reservation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationOutcome {
    pub ad_id: String,
    pub zip: String,
    /// Rows newly written; repeats of an existing (ad, date) are skipped
    pub created: usize,
    pub dates: Vec<NaiveDate>,
}

/// Process-local store, optionally persisted as JSON:
///
/// ```json
/// {"zips": {"94102": {"capacity": 10, "reserved": {"2025-06-01": 10}}}}
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCapacityStore {
    zips: RwLock<HashMap<String, ZipInventory>>,
}

impl InMemoryCapacityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, CapacityError> {
        let content = fs::read_to_string(path)?;
        let file: StoreFile = serde_json::from_str(&content)?;
        debug!(path = %path.display(), zips = file.zips.len(), "loaded capacity store");
        let zips = file.zips.into_iter().collect();
        Ok(Self {
            zips: RwLock::new(zips),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), CapacityError> {
        let zips = self.zips.read().clone().into_iter().collect();
        let file = StoreFile { zips };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn set_capacity(&self, zip: &str, capacity: u32) {
        let mut zips = self.zips.write();
        zips.entry(zip.to_string()).or_default().capacity = capacity;
    }

    pub fn set_daily_capacity(&self, zip: &str, date: NaiveDate, capacity: u32) {
        let mut zips = self.zips.write();
        let inv = zips.entry(zip.to_string()).or_default();
        inv.daily_capacity.insert(date, capacity);
    }

    pub fn set_reserved(&self, zip: &str, date: NaiveDate, reserved: u32) {
        let mut zips = self.zips.write();
        let inv = zips.entry(zip.to_string()).or_default();
        inv.reserved.insert(date, reserved);
    }

    /// Books `ad_id` on each date. Idempotent per (ad, date). Full days are
    /// still booked; the over-booking shows up as zero availability.
    pub fn reserve(&self, ad_id: &str, zip: &str, dates: &[NaiveDate]) -> ReservationOutcome {
        let dates = dates::normalize(dates);
        let mut zips = self.zips.write();
        let inv = zips.entry(zip.to_string()).or_default();
        let ad = ad_id.to_string();

        let mut created = 0;
        for &date in &dates {
            if inv.bookings.entry(date).or_default().insert(ad.clone()) {
                created += 1;
            }
        }

        ReservationOutcome {
            ad_id: ad_id.to_string(),
            zip: zip.to_string(),
            created,
            dates,
        }
    }
}

#[async_trait]
impl CapacityStore for InMemoryCapacityStore {
    async fn day_slots(&self, zip: &str, date: NaiveDate) -> Result<DaySlots, CapacityError> {
        let zips = self.zips.read();
        let day = match zips.get(zip) {
            Some(inv) => inv.day(date),
            None => DaySlots::default(),
        };
        Ok(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        dates::parse_date(s).unwrap()
    }

    #[tokio::test]
    async fn unknown_zip_is_fail_closed() {
        let store = InMemoryCapacityStore::new();
        let snap = store.capacity("99999", &[d("2025-06-01")]).await.unwrap();
        assert_eq!(snap, CapacitySnapshot::unknown("99999"));
        assert!(!snap.available());
    }

    #[tokio::test]
    async fn range_reports_worst_day() {
        let store = InMemoryCapacityStore::new();
        store.set_capacity("94102", 10);
        store.set_reserved("94102", d("2025-06-01"), 2);
        store.set_reserved("94102", d("2025-06-02"), 9);
        store.set_daily_capacity("94102", d("2025-06-03"), 12);
        store.set_reserved("94102", d("2025-06-03"), 10);

        let days = [d("2025-06-03"), d("2025-06-01"), d("2025-06-02")];
        let snap = store.capacity("94102", &days).await.unwrap();
        assert_eq!((snap.capacity, snap.reserved), (10, 9));
        assert!(snap.available());
        assert_eq!(snap.remaining(), 1);
    }

    #[tokio::test]
    async fn full_and_overbooked_are_unavailable() {
        let full = CapacitySnapshot::new("94102", 10, 10);
        assert!(!full.available());
        let over = CapacitySnapshot::new("94102", 3, 5);
        assert!(!over.available());
        assert_eq!(over.remaining(), 0);

        let store = InMemoryCapacityStore::new();
        store.set_capacity("94133", 1);
        store.set_reserved("94133", d("2025-06-01"), 4);
        let days = [d("2025-06-01"), d("2025-06-02")];
        let snap = store.capacity("94133", &days).await.unwrap();
        assert_eq!(snap.reserved, 4);
        assert!(!snap.available());
    }

    #[tokio::test]
    async fn reservations_are_idempotent() {
        let store = InMemoryCapacityStore::new();
        store.set_capacity("94103", 2);
        let days = [d("2025-06-01"), d("2025-06-01"), d("2025-06-02")];

        let first = store.reserve("ad-1", "94103", &days);
        assert_eq!(first.created, 2);
        assert_eq!(first.dates.len(), 2);
        assert_eq!(store.reserve("ad-1", "94103", &days).created, 0);
        assert_eq!(store.reserve("ad-2", "94103", &days[..1]).created, 1);

        let snap = store.capacity("94103", &[d("2025-06-01")]).await.unwrap();
        assert_eq!((snap.capacity, snap.reserved), (2, 2));
        assert!(!snap.available());
    }

    #[tokio::test]
    async fn report_covers_every_day() {
        let zip = "60614";
        let store = InMemoryCapacityStore::new();
        store.set_capacity(zip, 3);
        store.set_reserved(zip, d("2025-01-16"), 3);
        store.set_reserved(zip, d("2025-01-17"), 5);

        let (from, to) = (d("2025-01-15"), d("2025-01-17"));
        let report = availability_report(&store, zip, from, to).await.unwrap();
        assert_eq!(report.len(), 3);
        assert!(report[0].available);
        assert_eq!(report[0].slots_remaining, 3);
        assert!(!report[1].available);
        assert_eq!(report[2].slots_used, 5);
        assert_eq!(report[2].slots_remaining, 0);

        assert!(matches!(
            availability_report(&store, zip, to, from).await,
            Err(CapacityError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("capacity.json");
        let store = InMemoryCapacityStore::new();
        store.set_capacity("94102", 10);
        store.set_reserved("94102", d("2025-06-01"), 10);
        store.reserve("ad-9", "94102", &[d("2025-06-02")]);
        store.save(&path).unwrap();

        let loaded = InMemoryCapacityStore::load(&path).unwrap();
        let snap = loaded.capacity("94102", &[d("2025-06-02")]).await.unwrap();
        assert_eq!(snap.reserved, 1);
        let full = loaded.capacity("94102", &[d("2025-06-01")]).await.unwrap();
        assert!(!full.available());
    }
}
