//! Read-only queries over one committed dataset version.
//!
//! Every method reads from a single immutable snapshot, so results never mix versions
//! and never trigger recomputation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{CanonicalRecord, FeatureRecord, Outcome, FEATURE_COLUMNS};
use crate::error::{ReconError, Result};
use crate::pipeline::processing::similarity::{normalize_name, texts_agree};
use crate::pipeline::storage::{DatasetSnapshot, DatasetStore, VersionInfo, VersionSelector};

/// Columns available to `rows`: canonical-only columns plus every feature column
pub const QUERY_COLUMNS: &[&str] = &[
    "launch_id",
    "mission_name",
    "flight_number",
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
    "description",
];

/// Filter over launches. Unset fields match everything; a null value never satisfies a set field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchQuery {
    /// Inclusive UTC date bounds
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub outcome: Option<Outcome>,
    /// Case-insensitive substring of the rocket variant
    pub variant: Option<String>,
    pub site: Option<String>,
    pub payload_min_kg: Option<f64>,
    pub payload_max_kg: Option<f64>,
}

impl LaunchQuery {
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(day) = record.launch_time.map(|t| t.date()) else {
                return false;
            };
            if self.from.map_or(false, |from| day < from) || self.to.map_or(false, |to| day > to) {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if record.outcome != outcome {
                return false;
            }
        }
        if let Some(variant) = self.variant.as_deref() {
            let wanted = normalize_name(variant);
            match record.rocket_variant.as_deref() {
                Some(v) if normalize_name(v).contains(&wanted) => {}
                _ => return false,
            }
        }
        if let Some(site) = self.site.as_deref() {
            match record.launch_site() {
                Some(s) if texts_agree(s, site) => {}
                _ => return false,
            }
        }
        if self.payload_min_kg.is_some() || self.payload_max_kg.is_some() {
            let Some(mass) = record.payload_mass_kg else {
                return false;
            };
            if self.payload_min_kg.map_or(false, |min| mass < min)
                || self.payload_max_kg.map_or(false, |max| mass > max)
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub schema_version: u32,
    /// Feature columns in stable order; the `outcome` label is last
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteStats {
    pub site: String,
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    /// successes / total * 100, two decimals
    pub success_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub sites: Vec<SiteStats>,
    pub best_site: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub success: usize,
    pub failure: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantUsage {
    pub variant: String,
    pub launches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValue {
    pub column: String,
    pub missing: usize,
    pub percent: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct QueryService {
    snapshot: Arc<DatasetSnapshot>,
    features_by_id: HashMap<Uuid, usize>,
}

impl QueryService {
    pub fn new(snapshot: Arc<DatasetSnapshot>) -> Self {
        let features_by_id = snapshot
            .features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.launch_id, i))
            .collect();
        Self {
            snapshot,
            features_by_id,
        }
    }

    pub async fn open(store: &dyn DatasetStore, selector: &VersionSelector) -> Result<Self> {
        Ok(Self::new(store.read(selector).await?))
    }

    pub fn info(&self) -> &VersionInfo {
        &self.snapshot.info
    }

    pub fn snapshot(&self) -> &DatasetSnapshot {
        &self.snapshot
    }

    /// Matching launches paired with their feature rows, in dataset order
    pub fn select(&self, query: &LaunchQuery) -> Vec<(&CanonicalRecord, &FeatureRecord)> {
        self.snapshot
            .canonical
            .iter()
            .filter(|r| query.matches(r))
            .filter_map(|r| {
                self.features_by_id
                    .get(&r.launch_id)
                    .map(|&i| (r, &self.snapshot.features[i]))
            })
            .collect()
    }

    /// Projection of matching launches; an empty column list selects every column
    pub fn rows(&self, query: &LaunchQuery, columns: &[String]) -> Result<Vec<BTreeMap<String, Value>>> {
        let columns: Vec<String> = if columns.is_empty() {
            QUERY_COLUMNS.iter().map(|c| c.to_string()).collect()
        } else {
            if let Some(unknown) = columns.iter().find(|c| !QUERY_COLUMNS.contains(&c.as_str())) {
                return Err(ReconError::Config(format!("unknown column '{unknown}'")));
            }
            columns.to_vec()
        };

        Ok(self
            .select(query)
            .into_iter()
            .map(|(record, features)| {
                columns
                    .iter()
                    .map(|c| (c.clone(), column_value(record, features, c)))
                    .collect()
            })
            .collect())
    }

    pub fn feature_matrix(&self, query: &LaunchQuery) -> FeatureMatrix {
        let rows = self
            .select(query)
            .into_iter()
            .map(|(_, features)| FEATURE_COLUMNS.iter().map(|c| features.column(c)).collect())
            .collect();
        FeatureMatrix {
            schema_version: self.snapshot.info.schema_version,
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Per-site launch totals and success ratio; records without a site are left out.
    /// Spellings that normalize to the same name share one entry, shown as the first seen.
    pub fn site_summary(&self, query: &LaunchQuery) -> SiteSummary {
        let mut by_site: BTreeMap<String, SiteStats> = BTreeMap::new();
        for (record, _) in self.select(query) {
            let Some(site) = record.launch_site() else { continue };
            let stats = by_site.entry(normalize_name(site)).or_insert_with(|| SiteStats {
                site: site.to_string(),
                total: 0,
                successes: 0,
                failures: 0,
                success_ratio: 0.0,
            });
            stats.total += 1;
            match record.outcome {
                Outcome::Success => stats.successes += 1,
                Outcome::Failure => stats.failures += 1,
                Outcome::Unknown => {}
            }
        }
        let sites: Vec<SiteStats> = by_site
            .into_values()
            .map(|mut s| {
                s.success_ratio = round2(s.successes as f64 / s.total as f64 * 100.0);
                s
            })
            .collect();

        // highest ratio, then most launches, then name
        let best_site = sites
            .iter()
            .max_by(|a, b| {
                a.success_ratio
                    .total_cmp(&b.success_ratio)
                    .then_with(|| a.total.cmp(&b.total))
                    .then_with(|| b.site.cmp(&a.site))
            })
            .map(|s| s.site.clone());

        SiteSummary { sites, best_site }
    }

    pub fn launches_per_year(&self, query: &LaunchQuery) -> BTreeMap<i32, usize> {
        let mut years = BTreeMap::new();
        for (_, features) in self.select(query) {
            if let Some(year) = features.launch_year {
                *years.entry(year).or_insert(0) += 1;
            }
        }
        years
    }

    pub fn outcome_counts(&self, query: &LaunchQuery) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for (record, _) in self.select(query) {
            match record.outcome {
                Outcome::Success => counts.success += 1,
                Outcome::Failure => counts.failure += 1,
                Outcome::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    /// Launch count per rocket variant, most used first
    pub fn variant_usage(&self, query: &LaunchQuery) -> Vec<VariantUsage> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (record, _) in self.select(query) {
            if let Some(variant) = record.rocket_variant.as_deref() {
                *counts.entry(variant.to_string()).or_insert(0) += 1;
            }
        }
        let mut usage: Vec<VariantUsage> = counts
            .into_iter()
            .map(|(variant, launches)| VariantUsage { variant, launches })
            .collect();
        usage.sort_by(|a, b| b.launches.cmp(&a.launches).then_with(|| a.variant.cmp(&b.variant)));
        usage
    }

    /// Null count and percentage per feature column over the whole version
    pub fn missing_value_report(&self) -> Vec<MissingValue> {
        let total = self.snapshot.features.len();
        FEATURE_COLUMNS
            .iter()
            .map(|column| {
                let missing = self
                    .snapshot
                    .features
                    .iter()
                    .filter(|f| f.column(column).is_null())
                    .count();
                let percent = if total == 0 {
                    0.0
                } else {
                    round2(missing as f64 / total as f64 * 100.0)
                };
                MissingValue {
                    column: column.to_string(),
                    missing,
                    percent,
                }
            })
            .collect()
    }
}

fn column_value(record: &CanonicalRecord, features: &FeatureRecord, column: &str) -> Value {
    match column {
        "mission_name" => json!(record.mission_name),
        "flight_number" => json!(record.flight_number),
        "description" => json!(record.description),
        other => features.column(other),
    }
}
