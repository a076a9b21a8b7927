//! adreach - ZIP-radius ad inventory planner
//!
//! Commands:
//!   --suggest [ZIP] DATES       Check ZIP capacity, suggest nearby ZIPs if full
//!   --availability ZIP FROM TO  Per-day slot report
//!   --reserve AD ZIP DATES      Book an ad into a ZIP
//!   --geocode TEXT              Resolve a ZIP or place to coordinates
//!   --distance ZIP ZIP          Distance between two ZIPs
//!   --cache-stats               Show geocode cache contents
//!   --clear-cache               Drop the geocode cache
//!   --build-zipdb               Compile zips.json into the binary ZIP database
//!   --help                      Show usage

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use adreach::capacity::{self, InMemoryCapacityStore};
use adreach::config::{self, Paths, ProviderKind, Settings};
use adreach::dates;
use adreach::geo;
use adreach::geocode::{GeoResolver, GeocodeCache, Geocoder, ZipDbGeocoder};
use adreach::prefs::Preferences;
use adreach::zipcode;
use adreach::{now_epoch, zipdb, AlternativeZipPlanner, ZipDirectory};

#[cfg(feature = "google")]
use adreach::geocode::GoogleGeocoder;

enum Command {
    Suggest {
        zip: Option<String>,
        dates: Vec<NaiveDate>,
    },
    Availability {
        zip: String,
        from: NaiveDate,
        to: NaiveDate,
    },
    Reserve {
        ad_id: String,
        zip: String,
        dates: Vec<NaiveDate>,
    },
    Geocode(String),
    Distance(String, String),
    CacheStats,
    ClearCache,
    BuildZipDb,
}

fn print_usage() {
    eprintln!("adreach - ZIP-radius ad inventory planner");
    eprintln!();
    eprintln!("Usage: adreach COMMAND");
    eprintln!();
    eprintln!("  --suggest [ZIP] DATES       Check capacity, suggest nearby ZIPs if full");
    eprintln!("  --availability ZIP FROM TO  Per-day slot report");
    eprintln!("  --reserve AD ZIP DATES      Book ad AD into ZIP");
    eprintln!("  --geocode TEXT              Resolve a ZIP or place to coordinates");
    eprintln!("  --distance ZIP ZIP          Distance between two ZIPs");
    eprintln!("  --cache-stats               Show geocode cache contents");
    eprintln!("  --clear-cache               Drop the geocode cache");
    eprintln!("  --build-zipdb               Compile zips.json into us_zipcodes.bin");
    eprintln!("  --help                      Show this help");
    eprintln!();
    eprintln!("DATES is YYYY-MM-DD[,YYYY-MM-DD...] or FROM..TO");
    eprintln!("Without ZIP, --suggest uses zip_code from prefs.json");
}

fn fail(msg: &str) -> ! {
    eprintln!("{}", msg);
    process::exit(1);
}

fn arg(args: &[String], i: usize, what: &str) -> String {
    match args.get(i) {
        Some(a) => a.clone(),
        None => {
            eprintln!("{} requires {}", args[1], what);
            print_usage();
            process::exit(1);
        }
    }
}

fn date_list(s: &str) -> Vec<NaiveDate> {
    match dates::parse_date_arg(s) {
        Ok(days) => days,
        Err(e) => fail(&e.to_string()),
    }
}

fn single_date(s: &str) -> NaiveDate {
    match dates::parse_date(s) {
        Ok(day) => day,
        Err(e) => fail(&e.to_string()),
    }
}

fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "--suggest" | "suggest" if args.len() == 3 => Command::Suggest {
            zip: None,
            dates: date_list(&args[2]),
        },
        "--suggest" | "suggest" => Command::Suggest {
            // raw; the planner validates and echoes it back
            zip: Some(arg(&args, 2, "a ZIP code")),
            dates: date_list(&arg(&args, 3, "campaign dates")),
        },
        "--availability" | "availability" => Command::Availability {
            zip: arg(&args, 2, "a ZIP code"),
            from: single_date(&arg(&args, 3, "a start date")),
            to: single_date(&arg(&args, 4, "an end date")),
        },
        "--reserve" | "reserve" => Command::Reserve {
            ad_id: arg(&args, 2, "an ad id"),
            zip: arg(&args, 3, "a ZIP code"),
            dates: date_list(&arg(&args, 4, "dates")),
        },
        "--geocode" | "geocode" => Command::Geocode(args[2..].join(" ")),
        "--distance" | "distance" => {
            let a = arg(&args, 2, "two ZIP codes");
            let b = arg(&args, 3, "two ZIP codes");
            Command::Distance(a, b)
        }
        "--cache-stats" | "cache-stats" => Command::CacheStats,
        "--clear-cache" | "clear-cache" => Command::ClearCache,
        "--build-zipdb" | "build-zipdb" => Command::BuildZipDb,
        "--help" | "-h" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::new("info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = parse_args();

    let paths = match Paths::init() {
        Ok(p) => p,
        Err(e) => fail(&format!("Failed to initialize paths: {e}")),
    };

    let mut settings = Settings::load(&paths);
    let prefs = config::load_prefs(&paths);
    if let Some(prefs) = &prefs {
        settings.apply_prefs(prefs);
    }

    // Commands that don't need the planner
    match &command {
        Command::ClearCache => match config::clear_geocode_cache(&paths) {
            Ok(()) => {
                println!("Geocode cache cleared.");
                return;
            }
            Err(e) => fail(&format!("Failed to clear geocode cache: {e}")),
        },
        Command::BuildZipDb => process::exit(cmd_build_zipdb(&paths)),
        _ => {}
    }

    let directory = Arc::new(load_directory(&paths));
    let cache = Arc::new(GeocodeCache::new(
        settings.geocoder.cache_ttl_secs,
        settings.geocoder.cache_max_entries,
    ));
    config::load_geocode_cache(&paths, &cache);

    let provider = build_provider(&settings, &paths, &directory);
    let resolver = GeoResolver::new(provider, cache.clone())
        .with_timeout(Duration::from_secs(settings.geocoder.timeout_secs));

    let store = Arc::new(load_store(&paths));

    let result = match command {
        Command::Suggest { zip, dates } => {
            let home_zip = prefs.as_ref().and_then(Preferences::zip);
            let Some(zip) = zip.or(home_zip) else {
                fail("No ZIP given and no zip_code in prefs.json");
            };
            let planner = AlternativeZipPlanner::new(resolver, store, directory)
                .with_options(settings.planner);
            cmd_suggest(&planner, &zip, &dates).await
        }
        Command::Availability { zip, from, to } => cmd_availability(&store, &zip, from, to).await,
        Command::Reserve { ad_id, zip, dates } => cmd_reserve(&store, &paths, &ad_id, &zip, &dates),
        Command::Geocode(text) => cmd_geocode(&resolver, &text).await,
        Command::Distance(a, b) => cmd_distance(&resolver, &a, &b).await,
        Command::CacheStats => cmd_cache_stats(&cache),
        Command::ClearCache | Command::BuildZipDb => unreachable!(),
    };

    if let Err(e) = config::save_geocode_cache(&paths, &cache) {
        warn!(error = %e, "failed to save geocode cache");
    }
    process::exit(result);
}

fn load_directory(paths: &Paths) -> ZipDirectory {
    for path in [&paths.directory_file, &paths.zipdb_file] {
        if !path.exists() {
            continue;
        }
        match ZipDirectory::load(path) {
            Ok(dir) => return dir,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to load zip directory"),
        }
    }
    warn!("no zip directory found, radius searches will be empty");
    ZipDirectory::default()
}

fn load_store(paths: &Paths) -> InMemoryCapacityStore {
    let path = paths.capacity_file.display();
    if !paths.capacity_file.exists() {
        return InMemoryCapacityStore::new();
    }
    match InMemoryCapacityStore::load(&paths.capacity_file) {
        Ok(store) => store,
        Err(e) => fail(&format!("Failed to load {path}: {e}")),
    }
}

fn build_provider(
    settings: &Settings,
    paths: &Paths,
    directory: &Arc<ZipDirectory>,
) -> Arc<dyn Geocoder> {
    match settings.geocoder.provider {
        #[cfg(feature = "google")]
        ProviderKind::Google => {
            let timeout = Duration::from_secs(settings.geocoder.timeout_secs);
            let key = settings.geocoder.api_key.clone();
            let google = GoogleGeocoder::new(key, &settings.geocoder.country, timeout);
            Arc::new(google)
        }
        #[cfg(not(feature = "google"))]
        ProviderKind::Google => {
            warn!("built without the google feature, using the zip directory");
            directory.clone()
        }
        ProviderKind::ZipDb => Arc::new(ZipDbGeocoder::new(paths.zipdb_file.clone())),
        ProviderKind::Directory => directory.clone(),
    }
}

async fn cmd_suggest(planner: &AlternativeZipPlanner, zip: &str, dates: &[NaiveDate]) -> i32 {
    if let Some(zip) = zipcode::parse_zip(zip) {
        let radius = planner.options().radius_miles;
        eprintln!("{}", geo::coverage_description(&zip, radius));
    }

    let result = planner.suggest(zip, dates).await;
    match serde_json::to_string_pretty(&result) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Failed to encode result: {}", e);
            1
        }
    }
}

async fn cmd_availability(
    store: &InMemoryCapacityStore,
    zip: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> i32 {
    let Some(zip) = zipcode::parse_zip(zip) else {
        eprintln!("Invalid ZIP code. Must be 5 digits (or ZIP+4).");
        return 1;
    };
    match capacity::availability_report(store, &zip, from, to).await {
        Ok(days) => {
            println!("ZIP {}  {}..{}", zip, from, to);
            for day in days {
                let state = if day.available { "open" } else { "FULL" };
                println!(
                    "  {}  {:>3}/{:<3} used  {:>3} left  {}",
                    day.date, day.slots_used, day.capacity, day.slots_remaining, state
                );
            }
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn cmd_reserve(
    store: &InMemoryCapacityStore,
    paths: &Paths,
    ad_id: &str,
    zip: &str,
    dates: &[NaiveDate],
) -> i32 {
    let Some(zip) = zipcode::parse_zip(zip) else {
        eprintln!("Invalid ZIP code. Must be 5 digits (or ZIP+4).");
        return 1;
    };
    if ad_id.trim().is_empty() {
        eprintln!("Ad id must not be empty.");
        return 1;
    }

    let outcome = store.reserve(ad_id.trim(), &zip, dates);
    if let Err(e) = store.save(&paths.capacity_file) {
        eprintln!("Failed to save reservations: {}", e);
        return 1;
    }
    let requested = outcome.dates.len();
    println!(
        "Reserved {} new day(s) for {} in {} ({} requested)",
        outcome.created, outcome.ad_id, outcome.zip, requested
    );
    0
}

async fn cmd_geocode(resolver: &GeoResolver, text: &str) -> i32 {
    match resolver.resolve(text).await {
        Some(c) => {
            println!("{} -> {:.4}, {:.4}", text.trim(), c.latitude, c.longitude);
            0
        }
        None => {
            eprintln!("Could not geocode \"{}\"", text.trim());
            1
        }
    }
}

async fn cmd_distance(resolver: &GeoResolver, a: &str, b: &str) -> i32 {
    let (ca, cb) = tokio::join!(resolver.resolve(a), resolver.resolve(b));
    match (ca, cb) {
        (Some(ca), Some(cb)) => {
            let miles = geo::distance_miles(ca, cb);
            println!("{} -> {}: {}", a, b, geo::format_distance(miles));
            0
        }
        (None, _) => {
            eprintln!("Could not geocode {}", a);
            1
        }
        (_, None) => {
            eprintln!("Could not geocode {}", b);
            1
        }
    }
}

fn cmd_cache_stats(cache: &GeocodeCache) -> i32 {
    let stats = cache.stats(now_epoch());
    println!("Geocode cache: {} entries", stats.size);
    for e in stats.entries {
        let hours = e.age_secs / 3600;
        println!(
            "  {:<32} {:>9.4}, {:>9.4}  {}h old",
            e.location, e.coordinate.latitude, e.coordinate.longitude, hours
        );
    }
    0
}

fn cmd_build_zipdb(paths: &Paths) -> i32 {
    let src: &Path = &paths.directory_file;
    let dir = match ZipDirectory::load(src) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to read {}: {}", src.display(), e);
            return 1;
        }
    };
    match zipdb::write(&paths.zipdb_file, dir.locations()) {
        Ok(n) => {
            println!("Wrote {n} ZIP codes to {}", paths.zipdb_file.display());
            0
        }
        Err(e) => {
            eprintln!("Failed to write {}: {}", paths.zipdb_file.display(), e);
            1
        }
    }
}
