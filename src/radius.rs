//! Nearby-ZIP search around a center point.

use std::cmp::Ordering;

use crate::geo::{distance_miles, GeoCoordinate};
use crate::zipcode::ZipLocation;

/// A candidate ZIP and its distance from the search center
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyZip {
    pub location: ZipLocation,
    pub distance_miles: f64,
}

/// Candidates within `radius_miles` (inclusive) of `center`, nearest first.
///
/// `exclude_zip` drops the ZIP being searched around. Equal distances are
/// ordered by ZIP so output is deterministic.
pub fn find_within_radius(
    center: GeoCoordinate,
    candidates: &[ZipLocation],
    radius_miles: f64,
    exclude_zip: Option<&str>,
) -> Vec<NearbyZip> {
    let mut nearby: Vec<NearbyZip> = candidates
        .iter()
        .filter(|loc| exclude_zip != Some(loc.zip.as_str()))
        .map(|loc| NearbyZip {
            location: loc.clone(),
            distance_miles: distance_miles(center, loc.coordinate),
        })
        .filter(|n| n.distance_miles <= radius_miles)
        .collect();

    nearby.sort_by(|a, b| {
        a.distance_miles
            .partial_cmp(&b.distance_miles)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.location.zip.cmp(&b.location.zip))
    });
    nearby
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center() -> GeoCoordinate {
        GeoCoordinate {
            latitude: 37.7749,
            longitude: -122.4194,
        }
    }

    fn bay_area() -> Vec<ZipLocation> {
        vec![
            ZipLocation::new("94301", 37.4419, -122.1430), // Palo Alto, ~27 mi
            ZipLocation::new("94133", 37.8025, -122.4093),
            ZipLocation::new("94102", 37.7749, -122.4194),
            ZipLocation::new("94110", 37.7485, -122.4184),
            ZipLocation::new("94103", 37.7716, -122.4094),
            ZipLocation::new("94401", 37.5630, -122.3255), // San Mateo, ~15.6 mi
        ]
    }

    #[test]
    fn sorted_filtered_and_excluding_center() {
        let found = find_within_radius(center(), &bay_area(), 20.0, Some("94102"));
        let zips: Vec<&str> = found.iter().map(|n| n.location.zip.as_str()).collect();
        assert_eq!(zips, ["94103", "94110", "94133", "94401"]);
        let nearest_first = |w: &[NearbyZip]| w[0].distance_miles <= w[1].distance_miles;
        assert!(found.windows(2).all(nearest_first));
        assert!(found.iter().all(|n| n.distance_miles <= 20.0));
    }

    #[test]
    fn center_included_without_exclusion() {
        let found = find_within_radius(center(), &bay_area(), 1.0, None);
        assert_eq!(found[0].location.zip, "94102");
        assert_eq!(found[0].distance_miles, 0.0);
    }

    #[test]
    fn boundary_distance_is_inside() {
        let locs = bay_area();
        let exact = distance_miles(center(), locs[4].coordinate);
        let found = find_within_radius(center(), &locs, exact, Some("94102"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location.zip, "94103");
        let short = find_within_radius(center(), &locs, exact - 1e-9, Some("94102"));
        assert!(short.is_empty());
    }

    #[test]
    fn ties_break_by_zip() {
        let locs = vec![
            ZipLocation::new("20002", 38.0, -122.0),
            ZipLocation::new("20001", 38.0, -122.0),
        ];
        let west = GeoCoordinate {
            latitude: 38.0,
            longitude: -122.1,
        };
        let found = find_within_radius(west, &locs, 50.0, None);
        assert_eq!(found[0].location.zip, "20001");
        assert_eq!(found[1].location.zip, "20002");
    }

    #[test]
    fn empty_candidates() {
        assert!(find_within_radius(center(), &[], 20.0, None).is_empty());
    }
}
