/// Source names as they appear in configuration and provenance
pub const API_SOURCE: &str = "api";
pub const SCRAPE_SOURCE: &str = "scrape";

/// Reserved selector that always resolves to the newest committed version
pub const LATEST_VERSION: &str = "latest";

/// Bumped whenever a FeatureRecord column is added, removed or changes meaning
pub const FEATURE_SCHEMA_VERSION: u32 = 2;

// Matching defaults
pub const DEFAULT_TIME_TOLERANCE_HOURS: i64 = 24;
pub const DEFAULT_NAME_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_NUMERIC_TOLERANCE: f64 = 0.01;
/// Continuous attributes compared with the relative tolerance; everything else must match exactly
pub const DEFAULT_TOLERANT_ATTRIBUTES: &[&str] = &["payload_mass_kg"];

// Proximity defaults
pub const DEFAULT_MAX_LOOKUP_DISTANCE_M: f64 = 250_000.0;
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

pub const LB_TO_KG: f64 = 0.453592;

// Default file locations
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_STORE_DIR: &str = "data/versions";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_REFERENCE_FILE: &str = "reference/launch_sites.toml";

/// Public SpaceX v4 rocket ids and their display names
pub const DEFAULT_ROCKET_NAMES: &[(&str, &str)] = &[
    ("5e9d0d95eda69955f709d1eb", "Falcon 1"),
    ("5e9d0d95eda69973a809d1ec", "Falcon 9"),
    ("5e9d0d95eda69974db09d1ed", "Falcon Heavy"),
    ("5e9d0d96eda699382d09d1ee", "Starship"),
];

/// Public SpaceX v4 launchpad ids and the pad names used in the reference catalog
pub const DEFAULT_LAUNCHPAD_NAMES: &[(&str, &str)] = &[
    ("5e9e4501f509094ba4566f84", "CCSFS SLC 40"),
    ("5e9e4502f509094188566f88", "KSC LC 39A"),
    ("5e9e4502f509092b78566f87", "VAFB SLC 4E"),
    ("5e9e4501f5090910d4566f83", "VAFB SLC 3W"),
    ("5e9e4502f5090995de566f86", "Kwajalein Atoll"),
    ("5e9e4502f5090927f8566f85", "STLS"),
];

/// Scrape-side values that mean "not reported" rather than "unparseable"
pub const MISSING_VALUE_MARKERS: &[&str] = &["", "unknown", "classified", "n/a", "na", "tba", "tbd", "-", "\u{2014}", "nan"];

pub const HTTP_USER_AGENT: &str = concat!("launch_recon/", env!("CARGO_PKG_VERSION"));
pub const HTTP_TIMEOUT_SECS: u64 = 30;
