use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::constants::{
    DEFAULT_CONFIG_PATH, DEFAULT_LAUNCHPAD_NAMES, DEFAULT_LOG_DIR, DEFAULT_MAX_LOOKUP_DISTANCE_M, DEFAULT_NAME_SIMILARITY_THRESHOLD,
    DEFAULT_NUMERIC_TOLERANCE, DEFAULT_REFERENCE_FILE, DEFAULT_ROCKET_NAMES, DEFAULT_STORE_DIR,
    DEFAULT_TIME_TOLERANCE_HOURS, DEFAULT_TOLERANT_ATTRIBUTES,
};
use crate::domain::{Attribute, SourceId};
use crate::error::{ReconError, Result};
use crate::pipeline::processing::priority::SourcePriority;

pub const CONFIG_ENV_VAR: &str = "LAUNCH_RECON_CONFIG";
pub const METRICS_ADDR_ENV_VAR: &str = "LAUNCH_RECON_METRICS_ADDR";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub matching: MatchingConfig,
    pub priority: PriorityConfig,
    pub sources: SourcesConfig,
    pub proximity: ProximityConfig,
    pub store: StoreConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub time_tolerance_hours: i64,
    pub name_similarity_threshold: f64,
    /// Relative tolerance for numeric agreement (0.01 = 1%)
    pub numeric_tolerance: f64,
    /// Numeric attributes `numeric_tolerance` applies to
    pub tolerant_attributes: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            time_tolerance_hours: DEFAULT_TIME_TOLERANCE_HOURS,
            name_similarity_threshold: DEFAULT_NAME_SIMILARITY_THRESHOLD,
            numeric_tolerance: DEFAULT_NUMERIC_TOLERANCE,
            tolerant_attributes: DEFAULT_TOLERANT_ATTRIBUTES.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl MatchingConfig {
    pub fn time_tolerance(&self) -> chrono::Duration {
        chrono::Duration::hours(self.time_tolerance_hours)
    }

    pub fn tolerant_attributes(&self) -> Result<BTreeSet<Attribute>> {
        self.tolerant_attributes
            .iter()
            .map(|name| {
                Attribute::parse(name).ok_or_else(|| {
                    ReconError::Config(format!("matching.tolerant_attributes: unknown attribute '{name}'"))
                })
            })
            .collect()
    }
}

/// Ordered source preference. Attribute keys are the snake_case attribute names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub default: Vec<SourceId>,
    pub attributes: BTreeMap<String, Vec<SourceId>>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            Attribute::Description.as_str().to_string(),
            vec![SourceId::Scrape, SourceId::Api],
        );
        Self {
            default: vec![SourceId::Api, SourceId::Scrape],
            attributes,
        }
    }
}

impl PriorityConfig {
    pub fn to_policy(&self) -> Result<SourcePriority> {
        check_order("priority.default", &self.default)?;
        let mut overrides = BTreeMap::new();
        for (name, order) in &self.attributes {
            let attr = Attribute::parse(name)
                .ok_or_else(|| ReconError::Config(format!("priority.attributes: unknown attribute '{name}'")))?;
            check_order(&format!("priority.attributes.{name}"), order)?;
            overrides.insert(attr, order.clone());
        }
        Ok(SourcePriority::new(self.default.clone(), overrides))
    }
}

fn check_order(key: &str, order: &[SourceId]) -> Result<()> {
    if order.is_empty() {
        return Err(ReconError::Config(format!("{key}: source list must not be empty")));
    }
    for (i, source) in order.iter().enumerate() {
        if order[..i].contains(source) {
            return Err(ReconError::Config(format!("{key}: source '{source}' listed twice")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub api: ApiSourceConfig,
    pub scrape: ScrapeSourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSourceConfig {
    /// File path or http(s) URL of the launch JSON array
    pub location: Option<String>,
    /// Rocket code -> display name
    pub rocket_names: BTreeMap<String, String>,
    /// Launchpad code -> pad name as listed in the reference catalog
    pub launchpad_names: BTreeMap<String, String>,
}

impl Default for ApiSourceConfig {
    fn default() -> Self {
        Self {
            location: None,
            rocket_names: DEFAULT_ROCKET_NAMES
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
            launchpad_names: DEFAULT_LAUNCHPAD_NAMES
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScrapeSourceConfig {
    /// File path or http(s) URL of an HTML page or JSON row array
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    pub reference_file: PathBuf,
    pub max_lookup_distance_m: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            reference_file: PathBuf::from(DEFAULT_REFERENCE_FILE),
            max_lookup_distance_m: DEFAULT_MAX_LOOKUP_DISTANCE_M,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub listen_addr: Option<String>,
}

impl MetricsConfig {
    /// Configured address, with the environment variable taking precedence
    pub fn resolved_addr(&self) -> Option<String> {
        std::env::var(METRICS_ADDR_ENV_VAR).ok().or_else(|| self.listen_addr.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReconError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Explicit path, then `LAUNCH_RECON_CONFIG`, then `config.toml` if present, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            warn!("No config file found, using built-in defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;
        if m.time_tolerance_hours < 0 {
            return Err(ReconError::Config(format!(
                "matching.time_tolerance_hours must be >= 0, got {}",
                m.time_tolerance_hours
            )));
        }
        if !(m.name_similarity_threshold > 0.0 && m.name_similarity_threshold <= 1.0) {
            return Err(ReconError::Config(format!(
                "matching.name_similarity_threshold must be in (0, 1], got {}",
                m.name_similarity_threshold
            )));
        }
        if !(m.numeric_tolerance >= 0.0 && m.numeric_tolerance.is_finite()) {
            return Err(ReconError::Config(format!(
                "matching.numeric_tolerance must be >= 0, got {}",
                m.numeric_tolerance
            )));
        }
        m.tolerant_attributes()?;
        if !(self.proximity.max_lookup_distance_m > 0.0) {
            return Err(ReconError::Config(
                "proximity.max_lookup_distance_m must be positive".into(),
            ));
        }
        self.priority.to_policy()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config.matching.time_tolerance_hours, 24);
        assert_eq!(config.matching.name_similarity_threshold, 0.85);
        assert_eq!(config.matching.numeric_tolerance, 0.01);
        assert_eq!(config.priority.default, vec![SourceId::Api, SourceId::Scrape]);
        assert_eq!(config.sources.api.rocket_names.len(), 4);

        let policy = config.priority.to_policy().unwrap();
        assert_eq!(policy.order_for(Attribute::Outcome), &[SourceId::Api, SourceId::Scrape]);
        assert_eq!(policy.order_for(Attribute::Description), &[SourceId::Scrape, SourceId::Api]);
    }

    #[test]
    fn test_parse_full_config() {
        let input = r#"
[matching]
time_tolerance_hours = 12
name_similarity_threshold = 0.9
numeric_tolerance = 0.05

[priority]
default = ["scrape", "api"]

[priority.attributes]
outcome = ["api", "scrape"]

[sources.api]
location = "data/launches.json"

[sources.api.rocket_names]
abc = "Falcon 9"

[sources.scrape]
location = "https://en.wikipedia.org/wiki/List_of_Falcon_9_and_Falcon_Heavy_launches"

[proximity]
reference_file = "ref.toml"
max_lookup_distance_m = 1000.0

[store]
dir = "/tmp/versions"
"#;
        let config = PipelineConfig::from_toml(input).unwrap();
        assert_eq!(config.matching.time_tolerance(), chrono::Duration::hours(12));
        assert_eq!(config.sources.api.rocket_names["abc"], "Falcon 9");
        assert_eq!(config.store.dir, PathBuf::from("/tmp/versions"));

        let policy = config.priority.to_policy().unwrap();
        assert_eq!(policy.order_for(Attribute::PayloadMassKg), &[SourceId::Scrape, SourceId::Api]);
        assert_eq!(policy.order_for(Attribute::Outcome), &[SourceId::Api, SourceId::Scrape]);
        // overriding the attribute table drops the built-in description entry
        assert_eq!(policy.order_for(Attribute::Description), &[SourceId::Scrape, SourceId::Api]);
    }

    #[test]
    fn test_reject_bad_threshold() {
        let err = PipelineConfig::from_toml("[matching]\nname_similarity_threshold = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("name_similarity_threshold"));
    }

    #[test]
    fn test_reject_unknown_attribute() {
        let err = PipelineConfig::from_toml("[priority.attributes]\nthrust = [\"api\"]\n").unwrap_err();
        assert!(err.to_string().contains("thrust"));
    }

    #[test]
    fn test_reject_duplicate_source() {
        let err = PipelineConfig::from_toml("[priority]\ndefault = [\"api\", \"api\"]\n").unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn test_tolerant_attributes() {
        let config = PipelineConfig::from_toml("").unwrap();
        let tolerant = config.matching.tolerant_attributes().unwrap();
        assert!(tolerant.contains(&Attribute::PayloadMassKg));
        assert!(!tolerant.contains(&Attribute::FlightNumber));

        let err = PipelineConfig::from_toml("[matching]\ntolerant_attributes = [\"thrust\"]\n").unwrap_err();
        assert!(err.to_string().contains("tolerant_attributes"));
    }

    #[test]
    fn test_reject_unknown_source() {
        assert!(PipelineConfig::from_toml("[priority]\ndefault = [\"rss\"]\n").is_err());
    }
}
