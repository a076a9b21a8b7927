//! Reference directory of known ZIP locations.
//!
//! The candidate set for radius searches. Loaded from a JSON array of
//! `{zip, latitude, longitude, city?, state?}` or from the binary ZIP
//! database (no place names there). Also usable as an offline geocoder.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, GeocodeError};
use crate::geo::GeoCoordinate;
use crate::geocode::Geocoder;
use crate::zipcode::{self, ZipLocation};
use crate::zipdb;

/// Guard against pointing the loader at something that isn't a ZIP table
const MAX_DIRECTORY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct ZipDirectory {
    locations: Vec<ZipLocation>,
    index: HashMap<String, usize>,
}

impl ZipDirectory {
    /// Builds a directory. Invalid ZIPs and out-of-range coordinates are
    /// dropped; the first entry for a ZIP wins.
    pub fn new(locations: Vec<ZipLocation>) -> Self {
        let mut dir = Self::default();
        for mut loc in locations {
            let Some(zip) = zipcode::parse_zip(&loc.zip) else {
                debug!(zip = %loc.zip, "skipping malformed directory zip");
                continue;
            };
            if !loc.coordinate.is_valid() || dir.index.contains_key(&zip) {
                continue;
            }
            loc.zip = zip.clone();
            dir.index.insert(zip, dir.locations.len());
            dir.locations.push(loc);
        }
        dir
    }

    /// `.bin` files are read as the binary ZIP database, anything else as JSON
    pub fn load(path: &Path) -> Result<Self, Error> {
        let meta = fs::metadata(path)?;
        if meta.len() > MAX_DIRECTORY_BYTES {
            return Err(Error::Directory(format!(
                "{} is larger than {} bytes",
                path.display(),
                MAX_DIRECTORY_BYTES
            )));
        }

        let locations = if path.extension().is_some_and(|e| e == "bin") {
            zipdb::scan(path)?
        } else {
            let content = fs::read_to_string(path)?;
            serde_json::from_str::<Vec<ZipLocation>>(&content)?
        };

        let dir = Self::new(locations);
        debug!(path = %path.display(), zips = dir.len(), "loaded zip directory");
        Ok(dir)
    }

    pub fn get(&self, zip: &str) -> Option<&ZipLocation> {
        let zip = zipcode::parse_zip(zip)?;
        self.index.get(&zip).map(|&i| &self.locations[i])
    }

    pub fn locations(&self) -> &[ZipLocation] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[async_trait]
impl Geocoder for ZipDirectory {
    async fn geocode(&self, text: &str) -> Result<Option<GeoCoordinate>, GeocodeError> {
        Ok(self.get(text).map(|loc| loc.coordinate))
    }
}
