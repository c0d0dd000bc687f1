use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{API_SOURCE, SCRAPE_SOURCE};

pub mod canonical;
pub mod features;

pub use canonical::{
    AttributeProvenance, CanonicalRecord, MatchConfidence, Provenance, RecordFlag, Resolution,
    SourceRef, SourcedValue,
};
pub use features::{FeatureRecord, Season, FEATURE_COLUMNS, HAZARD_KINDS};

/// Which feed a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Api,
    Scrape,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => API_SOURCE,
            Self::Scrape => SCRAPE_SOURCE,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            API_SOURCE => Some(Self::Api),
            SCRAPE_SOURCE => Some(Self::Scrape),
            _ => None,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tri-state launch outcome. `Unknown` is treated as "no value" during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    #[default]
    Unknown,
}

impl Outcome {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Success,
            Some(false) => Self::Failure,
            None => Self::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }

    /// Classifier label: success = true, failure = false, unknown = null
    pub fn label(&self) -> Option<bool> {
        match self {
            Self::Success => Some(true),
            Self::Failure => Some(false),
            Self::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePrecision {
    /// Only the calendar day is known; the instant is midnight UTC
    Date,
    Time,
}

/// A launch timestamp together with the precision the source reported it at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTime {
    pub instant: DateTime<Utc>,
    pub precision: TimePrecision,
}

impl LaunchTime {
    pub fn exact(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            precision: TimePrecision::Time,
        }
    }

    pub fn date_only(day: NaiveDate) -> Self {
        Self {
            instant: day.and_time(chrono::NaiveTime::MIN).and_utc(),
            precision: TimePrecision::Date,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.instant.date_naive()
    }

    /// Absolute distance between two launch times
    pub fn gap(&self, other: &LaunchTime) -> chrono::Duration {
        (self.instant - other.instant).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadLocation {
    pub site_name: Option<String>,
    pub coordinates: Option<GeoPoint>,
}

impl PadLocation {
    pub fn named(site_name: impl Into<String>) -> Self {
        Self {
            site_name: Some(site_name.into()),
            coordinates: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.site_name.as_deref().map_or(true, |s| s.trim().is_empty()) && self.coordinates.is_none()
    }
}

/// A field a source adapter could not parse. The record is kept; the field is nulled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseIssue {
    pub field: Attribute,
    pub raw_value: Option<String>,
    pub reason: String,
}

/// Attributes resolved across sources. Ordering here is the column order of provenance output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    MissionName,
    LaunchTime,
    PadLocation,
    RocketVariant,
    BoosterSerial,
    Outcome,
    PayloadMassKg,
    FlightNumber,
    Orbit,
    Customer,
    BoosterLanding,
    Description,
}

impl Attribute {
    pub const ALL: [Attribute; 12] = [
        Attribute::MissionName,
        Attribute::LaunchTime,
        Attribute::PadLocation,
        Attribute::RocketVariant,
        Attribute::BoosterSerial,
        Attribute::Outcome,
        Attribute::PayloadMassKg,
        Attribute::FlightNumber,
        Attribute::Orbit,
        Attribute::Customer,
        Attribute::BoosterLanding,
        Attribute::Description,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissionName => "mission_name",
            Self::LaunchTime => "launch_time",
            Self::PadLocation => "pad_location",
            Self::RocketVariant => "rocket_variant",
            Self::BoosterSerial => "booster_serial",
            Self::Outcome => "outcome",
            Self::PayloadMassKg => "payload_mass_kg",
            Self::FlightNumber => "flight_number",
            Self::Orbit => "orbit",
            Self::Customer => "customer",
            Self::BoosterLanding => "booster_landing",
            Self::Description => "description",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == name.trim())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attribute payload used by the generic resolution loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Time(LaunchTime),
    Pad(PadLocation),
    Outcome(Outcome),
}

/// One launch observation from one source, as emitted by a SourceAdapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: SourceId,
    pub external_key: Option<String>,
    pub mission_name: String,
    pub launch_time: Option<LaunchTime>,
    pub pad_location: Option<PadLocation>,
    pub rocket_variant: Option<String>,
    pub booster_serial: Option<String>,
    pub outcome: Outcome,
    pub payload_mass_kg: Option<f64>,
    pub flight_number: Option<u32>,
    /// Target orbit as reported, e.g. "LEO", "GTO"
    pub orbit: Option<String>,
    pub customer: Option<String>,
    /// First-stage recovery result, e.g. "Success (ASDS)", "No attempt"
    pub booster_landing: Option<String>,
    pub description: Option<String>,
    /// Source fields with no mapped attribute
    pub raw_fields: BTreeMap<String, serde_json::Value>,
    pub issues: Vec<ParseIssue>,
}

impl RawRecord {
    pub fn new(source: SourceId, mission_name: impl Into<String>) -> Self {
        Self {
            source,
            external_key: None,
            mission_name: mission_name.into(),
            launch_time: None,
            pad_location: None,
            rocket_variant: None,
            booster_serial: None,
            outcome: Outcome::Unknown,
            payload_mass_kg: None,
            flight_number: None,
            orbit: None,
            customer: None,
            booster_landing: None,
            description: None,
            raw_fields: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    /// SHA-256 of the record's JSON form. Used for every ordering tie-break.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    pub fn has_issue(&self, field: Attribute) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }

    /// Records without a usable name or timestamp never take part in matching
    pub fn is_matchable(&self) -> bool {
        self.launch_time.is_some()
            && !self.mission_name.trim().is_empty()
            && !self.has_issue(Attribute::LaunchTime)
            && !self.has_issue(Attribute::MissionName)
    }

    pub fn attribute(&self, attr: Attribute) -> Option<AttributeValue> {
        match attr {
            Attribute::MissionName => non_blank(&self.mission_name).map(AttributeValue::Text),
            Attribute::LaunchTime => self.launch_time.map(AttributeValue::Time),
            Attribute::PadLocation => self
                .pad_location
                .as_ref()
                .filter(|p| !p.is_empty())
                .cloned()
                .map(AttributeValue::Pad),
            Attribute::RocketVariant => self.rocket_variant.as_deref().and_then(non_blank).map(AttributeValue::Text),
            Attribute::BoosterSerial => self.booster_serial.as_deref().and_then(non_blank).map(AttributeValue::Text),
            Attribute::Outcome => Some(self.outcome)
                .filter(Outcome::is_known)
                .map(AttributeValue::Outcome),
            Attribute::PayloadMassKg => self
                .payload_mass_kg
                .filter(|m| m.is_finite())
                .map(AttributeValue::Number),
            Attribute::FlightNumber => self.flight_number.map(|n| AttributeValue::Number(n as f64)),
            Attribute::Orbit => self.orbit.as_deref().and_then(non_blank).map(AttributeValue::Text),
            Attribute::Customer => self.customer.as_deref().and_then(non_blank).map(AttributeValue::Text),
            Attribute::BoosterLanding => self.booster_landing.as_deref().and_then(non_blank).map(AttributeValue::Text),
            Attribute::Description => self.description.as_deref().and_then(non_blank).map(AttributeValue::Text),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
