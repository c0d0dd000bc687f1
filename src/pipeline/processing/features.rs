use chrono::{DateTime, Datelike, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use crate::domain::{CanonicalRecord, FeatureRecord, GeoPoint, Season};
use crate::metrics::FeatureMetrics;
use crate::pipeline::diagnostics::{BatchDiagnostics, DiagnosticKind};
use crate::pipeline::processing::proximity::{HazardLookup, NearestHazard, ProximityIndex};
use crate::pipeline::processing::similarity::normalize_name;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone)]
pub struct DerivedFeatures {
    pub features: Vec<FeatureRecord>,
    pub diagnostics: BatchDiagnostics,
}

/// Derives the feature table from a canonical set.
///
/// Pure over its inputs: the same canonical set and index always yield the same rows.
/// History features walk the set in launch-time order; undated records come last and
/// never act as the prior launch of anything.
/// Hazard lookups for one record's pad
enum PadHazards {
    Located {
        nearest: HazardLookup,
        by_kind: BTreeMap<String, NearestHazard>,
    },
    /// Neither resolved nor catalog coordinates exist for the pad
    Unlocated { reason: String },
}

pub struct FeatureDeriver<'a> {
    index: &'a ProximityIndex,
}

impl<'a> FeatureDeriver<'a> {
    pub fn new(index: &'a ProximityIndex) -> Self {
        Self { index }
    }

    #[instrument(skip_all, fields(records = records.len()))]
    pub fn derive(&self, records: &[CanonicalRecord]) -> DerivedFeatures {
        let mut diagnostics = BatchDiagnostics::default();

        let mut ordered: Vec<&CanonicalRecord> = records.iter().collect();
        ordered.sort_by_key(|r| (r.launch_time.is_none(), r.launch_time.map(|t| t.instant), r.launch_id));

        let mut booster_uses: HashMap<String, u32> = HashMap::new();
        let mut prior_launch: Option<DateTime<Utc>> = None;
        let mut features = Vec::with_capacity(ordered.len());

        for record in ordered {
            let launch_time = record.launch_time.map(|t| t.instant);

            let booster = record
                .booster_serial
                .as_deref()
                .map(normalize_name)
                .filter(|b| !b.is_empty());
            let reuse_count = match &booster {
                Some(key) => {
                    let uses = booster_uses.entry(key.clone()).or_insert(0);
                    let earlier = *uses;
                    *uses += 1;
                    earlier
                }
                None => 0,
            };

            let days_since_prior_launch = match (launch_time, prior_launch) {
                (Some(now), Some(prev)) => Some((now - prev).num_seconds() as f64 / SECONDS_PER_DAY),
                _ => None,
            };
            if launch_time.is_some() {
                prior_launch = launch_time;
            }

            let mut hazard_distances_m = BTreeMap::new();
            let (pad_hazard_distance_m, nearest_hazard) = match self.hazards_for(record) {
                PadHazards::Located { nearest, by_kind } => {
                    hazard_distances_m = by_kind.into_iter().map(|(kind, h)| (kind, h.distance_m)).collect();
                    match nearest {
                        HazardLookup::Hit(hit) => (Some(hit.distance_m), Some(hit.name)),
                        HazardLookup::Miss { reason } => {
                            FeatureMetrics::record_lookup_miss();
                            diagnostics.push(
                                DiagnosticKind::ProximityLookupMiss,
                                record.launch_id.to_string(),
                                format!("'{}': {}", record.mission_name, reason),
                            );
                            (None, None)
                        }
                    }
                }
                PadHazards::Unlocated { reason } => {
                    FeatureMetrics::record_unlocated_pad();
                    diagnostics.push(
                        DiagnosticKind::UnlocatedPad,
                        record.launch_id.to_string(),
                        format!("'{}': {}", record.mission_name, reason),
                    );
                    (None, None)
                }
            };

            features.push(FeatureRecord {
                launch_id: record.launch_id,
                launch_time,
                launch_year: FeatureRecord::launch_year_of(launch_time),
                season: launch_time.and_then(|t| Season::from_month(t.month())),
                rocket_variant: record.rocket_variant.clone(),
                launch_site: record.launch_site().map(str::to_string),
                payload_mass_kg: record.payload_mass_kg,
                orbit: record.orbit.clone(),
                customer: record.customer.clone(),
                booster_serial: record.booster_serial.clone(),
                booster_landing: record.booster_landing.clone(),
                reuse_count,
                is_reused_booster: reuse_count > 0,
                days_since_prior_launch,
                pad_hazard_distance_m,
                nearest_hazard,
                hazard_distances_m,
                match_confidence: record.match_confidence,
                outcome: record.outcome,
            });
        }

        FeatureMetrics::record_derived(features.len());
        debug!(
            rows = features.len(),
            misses = diagnostics.count(DiagnosticKind::ProximityLookupMiss),
            unlocated = diagnostics.count(DiagnosticKind::UnlocatedPad),
            "Derived features"
        );
        DerivedFeatures { features, diagnostics }
    }

    /// Resolved coordinates first, then the pad catalog by site name
    fn hazards_for(&self, record: &CanonicalRecord) -> PadHazards {
        let pad = record.pad_location.as_ref();
        if let Some(point) = pad.and_then(|p| p.coordinates).filter(GeoPoint::is_valid) {
            return PadHazards::Located {
                nearest: self.index.nearest_hazard(point),
                by_kind: self.index.nearest_by_kind(point),
            };
        }
        if let Some(site) = record.launch_site() {
            if let (Some(nearest), Some(by_kind)) = (self.index.pad_hazard(site), self.index.pad_hazards_by_kind(site)) {
                return PadHazards::Located {
                    nearest: nearest.clone(),
                    by_kind: by_kind.clone(),
                };
            }
        }
        PadHazards::Unlocated {
            reason: match record.launch_site() {
                Some(site) => format!("pad '{site}' has no known coordinates"),
                None => "no pad location".to_string(),
            },
        }
    }
}
