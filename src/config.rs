//! Configuration, geocode cache persistence, and path resolution.
//!
//! INI parser for [planner] and [geocoder] sections. Geocode cache, capacity
//! data and preferences as JSON via serde.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::geocode::{CacheRecord, GeocodeCache};
use crate::planner::PlannerOptions;
use crate::prefs::Preferences;
use crate::{GEOCODE_CACHE_MAX_ENTRIES, GEOCODE_TIMEOUT_SEC, GEOCODE_TTL_SEC};

const MAX_CACHE_FILE_BYTES: usize = 4 * 1024 * 1024;
const MAX_PREFS_FILE_BYTES: usize = 64 * 1024;

/// Resolved filesystem paths
#[derive(Clone, Debug)]
pub struct Paths {
    pub config_file: PathBuf,
    pub cache_file: PathBuf,
    pub capacity_file: PathBuf,
    pub directory_file: PathBuf,
    pub zipdb_file: PathBuf,
    pub prefs_file: PathBuf,
}

impl Paths {
    /// `$ADREACH_HOME`, else `$HOME/.config/adreach`
    pub fn init() -> Result<Self, io::Error> {
        let config_dir = match std::env::var_os("ADREACH_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let Some(home) = std::env::var_os("HOME") else {
                    return Err(io::Error::new(io::ErrorKind::NotFound, "HOME not set"));
                };
                PathBuf::from(home).join(".config").join("adreach")
            }
        };
        fs::create_dir_all(&config_dir)?;
        Ok(Self::in_dir(&config_dir))
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_file: dir.join("config.ini"),
            cache_file: dir.join("geocode_cache.json"),
            capacity_file: dir.join("capacity.json"),
            directory_file: dir.join("zips.json"),
            zipdb_file: dir.join("us_zipcodes.bin"),
            prefs_file: dir.join("prefs.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    ZipDb,
    Directory,
}

impl ProviderKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Some(Self::Google),
            "zipdb" => Some(Self::ZipDb),
            "directory" => Some(Self::Directory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocoderSettings {
    pub provider: ProviderKind,
    pub country: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: i64,
    pub cache_max_entries: usize,
    pub api_key: Option<String>,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Directory,
            country: "US".to_string(),
            timeout_secs: GEOCODE_TIMEOUT_SEC,
            cache_ttl_secs: GEOCODE_TTL_SEC,
            cache_max_entries: GEOCODE_CACHE_MAX_ENTRIES,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub planner: PlannerOptions,
    pub geocoder: GeocoderSettings,
}

impl Settings {
    /// Missing file means defaults. `GOOGLE_MAPS_API_KEY` supplies the key.
    pub fn load(paths: &Paths) -> Self {
        let mut settings = match fs::read_to_string(&paths.config_file) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        };
        if let Ok(key) = std::env::var("GOOGLE_MAPS_API_KEY") {
            settings.geocoder.api_key = Some(key).filter(|k| !k.trim().is_empty());
        }
        settings
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        let p = &mut s.planner;
        let g = &mut s.geocoder;
        let mut section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if trimmed.starts_with('[') {
                section = trimmed.trim_matches(['[', ']']).trim().to_string();
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            let ok = match (section.as_str(), key) {
                ("planner", "radius_miles") => set(&mut p.radius_miles, value, finite_positive),
                ("planner", "max_candidates") => set(&mut p.max_candidates, value, positive),
                ("planner", "max_suggestions") => set(&mut p.max_suggestions, value, positive),
                ("planner", "max_diagnostics") => set(&mut p.max_diagnostics, value, positive),
                ("geocoder", "provider") => match ProviderKind::parse(value) {
                    Some(kind) => {
                        g.provider = kind;
                        true
                    }
                    None => false,
                },
                ("geocoder", "country") => {
                    g.country = value.to_uppercase();
                    true
                }
                ("geocoder", "timeout_secs") => set(&mut g.timeout_secs, value, positive),
                ("geocoder", "cache_ttl_days") => {
                    let mut days: i64 = 0;
                    let ok = set(&mut days, value, positive);
                    if ok {
                        g.cache_ttl_secs = days * 24 * 60 * 60;
                    }
                    ok
                }
                ("geocoder", "cache_max_entries") => set(&mut g.cache_max_entries, value, positive),
                _ => true,
            };

            if !ok {
                warn!(section = %section, key, value, "ignoring invalid config value");
            }
        }
        s
    }

    /// Preference overrides: radius and country
    pub fn apply_prefs(&mut self, prefs: &Preferences) {
        if let Some(r) = prefs.radius() {
            self.planner.radius_miles = r;
        }
        if let Some(cc) = prefs.country() {
            self.geocoder.country = cc;
        }
    }
}

fn positive<T: PartialOrd + Default>(v: &T) -> bool {
    *v > T::default()
}

fn finite_positive(v: &f64) -> bool {
    v.is_finite() && *v > 0.0
}

fn set<T: std::str::FromStr>(slot: &mut T, value: &str, valid: impl Fn(&T) -> bool) -> bool {
    match value.parse::<T>() {
        Ok(v) if valid(&v) => {
            *slot = v;
            true
        }
        _ => false,
    }
}

/// Load preferences from JSON; absent or unreadable means none
pub fn load_prefs(paths: &Paths) -> Option<Preferences> {
    let content = fs::read_to_string(&paths.prefs_file).ok()?;
    if content.len() > MAX_PREFS_FILE_BYTES {
        return None;
    }
    match Preferences::from_json(&content) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(error = %e, "ignoring malformed prefs file");
            None
        }
    }
}

/// Load persisted geocode cache entries into `cache`. Returns entries read.
pub fn load_geocode_cache(paths: &Paths, cache: &GeocodeCache) -> usize {
    let Ok(content) = fs::read_to_string(&paths.cache_file) else {
        return 0;
    };
    if content.len() > MAX_CACHE_FILE_BYTES {
        warn!(bytes = content.len(), "geocode cache file too large");
        return 0;
    }
    match serde_json::from_str::<Vec<CacheRecord>>(&content) {
        Ok(records) => {
            let n = records.len();
            cache.restore(records);
            n
        }
        Err(e) => {
            warn!(error = %e, "geocode cache file unreadable, starting empty");
            0
        }
    }
}

/// Save geocode cache to JSON
pub fn save_geocode_cache(paths: &Paths, cache: &GeocodeCache) -> Result<(), io::Error> {
    let records = cache.records();
    let json = serde_json::to_string_pretty(&records)?;
    fs::write(&paths.cache_file, json)
}

/// Remove geocode cache file. Already gone counts as cleared.
pub fn clear_geocode_cache(paths: &Paths) -> Result<(), io::Error> {
    match fs::remove_file(&paths.cache_file) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
