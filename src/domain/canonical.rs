use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{Attribute, AttributeValue, LaunchTime, Outcome, PadLocation, SourceId};

/// How a canonical record's members were tied together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchConfidence {
    /// Shared source-native identifier
    Exact,
    /// Time window plus name similarity
    Fuzzy,
    /// Single-source record
    Unmatched,
}

impl MatchConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "EXACT",
            Self::Fuzzy => "FUZZY",
            Self::Unmatched => "UNMATCHED",
        }
    }
}

impl std::fmt::Display for MatchConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFlag {
    /// No usable launch_time; excluded from time-window matching
    MissingLaunchTime,
    /// A source adapter nulled at least one field it could not parse
    UnparseableFields,
    /// Matching candidates existed but were claimed by a better pair
    AmbiguousMatch,
}

/// Reference to a RawRecord that contributed to a canonical record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: SourceId,
    pub external_key: Option<String>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Single,
    Agreed,
    WithinTolerance,
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedValue {
    pub source: SourceId,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeProvenance {
    pub resolution: Resolution,
    /// Source whose value was kept
    pub chosen: SourceId,
    /// Every source that supplied a value
    pub contributors: Vec<SourceId>,
    /// Values that differed from the kept one, kept for audit
    pub alternatives: Vec<SourcedValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub members: Vec<SourceRef>,
    pub attributes: BTreeMap<Attribute, AttributeProvenance>,
}

impl Provenance {
    pub fn cites(&self, source: SourceId) -> bool {
        self.members.iter().any(|m| m.source == source)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = (&Attribute, &AttributeProvenance)> {
        self.attributes
            .iter()
            .filter(|(_, p)| p.resolution == Resolution::Conflict)
    }

    pub fn attribute(&self, attr: Attribute) -> Option<&AttributeProvenance> {
        self.attributes.get(&attr)
    }
}

/// One reconciled launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub launch_id: Uuid,
    pub mission_name: String,
    pub launch_time: Option<LaunchTime>,
    pub pad_location: Option<PadLocation>,
    pub rocket_variant: Option<String>,
    pub booster_serial: Option<String>,
    pub outcome: Outcome,
    pub payload_mass_kg: Option<f64>,
    pub flight_number: Option<u32>,
    pub orbit: Option<String>,
    pub customer: Option<String>,
    pub booster_landing: Option<String>,
    pub description: Option<String>,
    pub raw_fields: BTreeMap<String, serde_json::Value>,
    pub match_confidence: MatchConfidence,
    pub provenance: Provenance,
    pub flags: Vec<RecordFlag>,
}

impl CanonicalRecord {
    /// Empty shell; the reconciler fills it attribute by attribute
    pub fn empty(match_confidence: MatchConfidence) -> Self {
        Self {
            launch_id: Uuid::nil(),
            mission_name: String::new(),
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
            match_confidence,
            provenance: Provenance::default(),
            flags: Vec::new(),
        }
    }

    /// Place a resolved value into its typed field. Mismatched pairs are ignored.
    pub fn set(&mut self, attr: Attribute, value: AttributeValue) {
        match (attr, value) {
            (Attribute::MissionName, AttributeValue::Text(v)) => self.mission_name = v,
            (Attribute::LaunchTime, AttributeValue::Time(v)) => self.launch_time = Some(v),
            (Attribute::PadLocation, AttributeValue::Pad(v)) => self.pad_location = Some(v),
            (Attribute::RocketVariant, AttributeValue::Text(v)) => self.rocket_variant = Some(v),
            (Attribute::BoosterSerial, AttributeValue::Text(v)) => self.booster_serial = Some(v),
            (Attribute::Outcome, AttributeValue::Outcome(v)) => self.outcome = v,
            (Attribute::PayloadMassKg, AttributeValue::Number(v)) => self.payload_mass_kg = Some(v),
            (Attribute::FlightNumber, AttributeValue::Number(v)) => {
                self.flight_number = (v >= 0.0 && v.fract() == 0.0).then_some(v as u32)
            }
            (Attribute::Orbit, AttributeValue::Text(v)) => self.orbit = Some(v),
            (Attribute::Customer, AttributeValue::Text(v)) => self.customer = Some(v),
            (Attribute::BoosterLanding, AttributeValue::Text(v)) => self.booster_landing = Some(v),
            (Attribute::Description, AttributeValue::Text(v)) => self.description = Some(v),
            _ => {}
        }
    }

    pub fn launch_site(&self) -> Option<&str> {
        self.pad_location.as_ref().and_then(|p| p.site_name.as_deref())
    }

    pub fn has_flag(&self, flag: RecordFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn flag(&mut self, flag: RecordFlag) {
        if !self.has_flag(flag) {
            self.flags.push(flag);
        }
    }
}
