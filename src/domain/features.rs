use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{MatchConfidence, Outcome};

/// Northern-hemisphere meteorological season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Self::Winter),
            3..=5 => Some(Self::Spring),
            6..=8 => Some(Self::Summer),
            9..=11 => Some(Self::Autumn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
        }
    }
}

/// Hazard kinds that get their own distance column, named `<kind>_distance_m`
pub const HAZARD_KINDS: &[&str] = &["coastline", "highway", "railway"];

/// Stable column order of the feature table. The classifier label is last.
pub const FEATURE_COLUMNS: &[&str] = &[
    "launch_id",
    "launch_time",
    "launch_year",
    "season",
    "rocket_variant",
    "launch_site",
    "payload_mass_kg",
    "orbit",
    "customer",
    "booster_serial",
    "booster_landing",
    "reuse_count",
    "is_reused_booster",
    "days_since_prior_launch",
    "pad_hazard_distance_m",
    "nearest_hazard",
    "coastline_distance_m",
    "highway_distance_m",
    "railway_distance_m",
    "match_confidence",
    "outcome",
];

/// Derived attributes for one canonical record. Missing inputs stay null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub launch_id: Uuid,
    pub launch_time: Option<DateTime<Utc>>,
    pub launch_year: Option<i32>,
    pub season: Option<Season>,
    pub rocket_variant: Option<String>,
    pub launch_site: Option<String>,
    pub payload_mass_kg: Option<f64>,
    #[serde(default)]
    pub orbit: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    pub booster_serial: Option<String>,
    #[serde(default)]
    pub booster_landing: Option<String>,
    pub reuse_count: u32,
    pub is_reused_booster: bool,
    pub days_since_prior_launch: Option<f64>,
    pub pad_hazard_distance_m: Option<f64>,
    pub nearest_hazard: Option<String>,
    /// Distance to the nearest hazard of each kind in range; kinds with nothing in range are absent
    #[serde(default)]
    pub hazard_distances_m: BTreeMap<String, f64>,
    pub match_confidence: MatchConfidence,
    pub outcome: Outcome,
}

impl FeatureRecord {
    pub fn launch_year_of(time: Option<DateTime<Utc>>) -> Option<i32> {
        time.map(|t| t.year())
    }

    /// Value of a single column, `Value::Null` for nulls and unknown names
    pub fn column(&self, name: &str) -> Value {
        match name {
            "launch_id" => json!(self.launch_id.to_string()),
            "launch_time" => json!(self.launch_time.map(|t| t.to_rfc3339())),
            "launch_year" => json!(self.launch_year),
            "season" => json!(self.season.map(|s| s.as_str())),
            "rocket_variant" => json!(self.rocket_variant),
            "launch_site" => json!(self.launch_site),
            "payload_mass_kg" => json!(self.payload_mass_kg),
            "orbit" => json!(self.orbit),
            "customer" => json!(self.customer),
            "booster_serial" => json!(self.booster_serial),
            "booster_landing" => json!(self.booster_landing),
            "reuse_count" => json!(self.reuse_count),
            "is_reused_booster" => json!(self.is_reused_booster),
            "days_since_prior_launch" => json!(self.days_since_prior_launch),
            "pad_hazard_distance_m" => json!(self.pad_hazard_distance_m),
            "nearest_hazard" => json!(self.nearest_hazard),
            "match_confidence" => json!(self.match_confidence.as_str()),
            "outcome" => json!(self.outcome.label()),
            other => match other.strip_suffix("_distance_m") {
                Some(kind) if HAZARD_KINDS.contains(&kind) => json!(self.hazard_distances_m.get(kind)),
                _ => Value::Null,
            },
        }
    }

    pub fn to_row(&self) -> BTreeMap<String, Value> {
        FEATURE_COLUMNS
            .iter()
            .map(|c| (c.to_string(), self.column(c)))
            .collect()
    }
}
