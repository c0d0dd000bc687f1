use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::domain::{
    Attribute, AttributeProvenance, AttributeValue, CanonicalRecord, LaunchTime, MatchConfidence, PadLocation,
    RawRecord, RecordFlag, Resolution, SourceRef, SourcedValue, TimePrecision,
};
use crate::error::Result;
use crate::metrics::ReconcileMetrics;
use crate::pipeline::diagnostics::{BatchDiagnostics, DiagnosticKind};
use crate::pipeline::processing::priority::SourcePriority;
use crate::pipeline::processing::proximity::haversine_m;
use crate::pipeline::processing::similarity::{name_similarity, normalize_name, texts_agree};

/// Namespace for v5 launch ids. Changing it re-keys every dataset.
pub const LAUNCH_NAMESPACE: Uuid = Uuid::from_u128(0x6c61_756e_6368_2d72_6563_6f6e_2d6e_7330);

/// Two exact timestamps this close are the same event reported at different precision
const TIME_AGREEMENT_SECS: i64 = 60;
/// Two pad coordinates this close are the same pad
const PAD_AGREEMENT_M: f64 = 1_000.0;

/// Matching and conflict-resolution settings
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub time_tolerance: chrono::Duration,
    pub name_similarity_threshold: f64,
    pub numeric_tolerance: f64,
    /// Attributes whose numeric values may differ by `numeric_tolerance`
    pub tolerant_attributes: BTreeSet<Attribute>,
    pub priority: SourcePriority,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        let matching = crate::config::MatchingConfig::default();
        Self {
            time_tolerance: matching.time_tolerance(),
            name_similarity_threshold: matching.name_similarity_threshold,
            numeric_tolerance: matching.numeric_tolerance,
            tolerant_attributes: matching.tolerant_attributes().unwrap_or_default(),
            priority: SourcePriority::default(),
        }
    }
}

impl ReconcileConfig {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            time_tolerance: config.matching.time_tolerance(),
            name_similarity_threshold: config.matching.name_similarity_threshold,
            numeric_tolerance: config.matching.numeric_tolerance,
            tolerant_attributes: config.matching.tolerant_attributes()?,
            priority: config.priority.to_policy()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileOutput {
    pub records: Vec<CanonicalRecord>,
    pub diagnostics: BatchDiagnostics,
}

/// Turns one batch of RawRecords from every source into CanonicalRecords
pub trait Reconciler {
    fn reconcile(&self, records: &[RawRecord]) -> ReconcileOutput;
}

/// Default reconciler: stateless pair scoring, union-find grouping, one-to-one pairing
pub struct RecordReconciler {
    pub config: ReconcileConfig,
}

struct Entry<'a> {
    record: &'a RawRecord,
    fingerprint: String,
}

/// A cross-source pair that passed the EXACT or FUZZY test
#[derive(Debug, Clone)]
struct Candidate {
    left: usize,
    right: usize,
    confidence: MatchConfidence,
    similarity: f64,
    gap_secs: i64,
}

impl Candidate {
    /// EXACT first, then higher similarity, then smaller time gap, then entry order
    fn preference(&self, other: &Candidate) -> Ordering {
        self.confidence
            .cmp(&other.confidence)
            .then_with(|| other.similarity.total_cmp(&self.similarity))
            .then_with(|| self.gap_secs.cmp(&other.gap_secs))
            .then_with(|| (self.left, self.right).cmp(&(other.left, other.right)))
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // smaller index becomes the root so grouping is independent of union order
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// How a non-chosen value relates to the chosen one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Agreement {
    Same,
    Tolerated,
    Differs,
}

impl Default for RecordReconciler {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}

impl RecordReconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    fn candidate(&self, entries: &[Entry<'_>], left: usize, right: usize) -> Option<Candidate> {
        let (a, b) = (entries[left].record, entries[right].record);
        if a.source == b.source || !a.is_matchable() || !b.is_matchable() {
            return None;
        }
        let (ta, tb) = (a.launch_time?, b.launch_time?);
        let gap_secs = ta.gap(&tb).num_seconds();

        let shared_key = match (a.external_key.as_deref(), b.external_key.as_deref()) {
            (Some(ka), Some(kb)) => !ka.trim().is_empty() && ka.trim() == kb.trim(),
            _ => false,
        };
        if shared_key {
            return Some(Candidate {
                left,
                right,
                confidence: MatchConfidence::Exact,
                similarity: name_similarity(&a.mission_name, &b.mission_name),
                gap_secs,
            });
        }

        if ta.gap(&tb) > self.config.time_tolerance {
            return None;
        }
        let similarity = name_similarity(&a.mission_name, &b.mission_name);
        (similarity >= self.config.name_similarity_threshold).then_some(Candidate {
            left,
            right,
            confidence: MatchConfidence::Fuzzy,
            similarity,
            gap_secs,
        })
    }

    fn candidates(&self, entries: &[Entry<'_>]) -> Vec<Candidate> {
        let mut out = Vec::new();
        for left in 0..entries.len() {
            for right in (left + 1)..entries.len() {
                if let Some(c) = self.candidate(entries, left, right) {
                    out.push(c);
                }
            }
        }
        out
    }

    fn agreement(&self, attr: Attribute, chosen: &AttributeValue, other: &AttributeValue) -> Agreement {
        use AttributeValue::*;
        match (chosen, other) {
            (Text(a), Text(b)) if a == b || texts_agree(a, b) => Agreement::Same,
            (Number(a), Number(b)) if a == b => Agreement::Same,
            (Number(a), Number(b)) if self.config.tolerant_attributes.contains(&attr) => {
                let scale = a.abs().max(b.abs());
                if (a - b).abs() <= self.config.numeric_tolerance * scale {
                    Agreement::Tolerated
                } else {
                    Agreement::Differs
                }
            }
            (Time(a), Time(b)) => time_agreement(a, b),
            (Pad(a), Pad(b)) => pad_agreement(a, b),
            (Outcome(a), Outcome(b)) if a == b => Agreement::Same,
            _ => Agreement::Differs,
        }
    }

    /// Resolve every attribute of a 1- or 2-member group
    fn merge(&self, members: &[&Entry<'_>], confidence: MatchConfidence) -> (CanonicalRecord, usize) {
        let mut record = CanonicalRecord::empty(confidence);
        let mut conflicts = 0;

        record.provenance.members = members
            .iter()
            .map(|m| SourceRef {
                source: m.record.source,
                external_key: m.record.external_key.clone(),
                fingerprint: m.fingerprint.clone(),
            })
            .collect();

        for attr in Attribute::ALL {
            let mut supplied: Vec<SourcedValue> = members
                .iter()
                .filter_map(|m| {
                    m.record.attribute(attr).map(|value| SourcedValue {
                        source: m.record.source,
                        value,
                    })
                })
                .collect();
            if supplied.is_empty() {
                continue;
            }
            supplied.sort_by_key(|sv| self.config.priority.rank(attr, sv.source));

            let chosen = supplied[0].clone();
            let mut worst = Agreement::Same;
            let mut alternatives = Vec::new();
            for other in &supplied[1..] {
                worst = worst.max(self.agreement(attr, &chosen.value, &other.value));
                if other.value != chosen.value {
                    alternatives.push(other.clone());
                }
            }
            let resolution = match (supplied.len(), worst) {
                (1, _) => Resolution::Single,
                (_, Agreement::Same) => Resolution::Agreed,
                (_, Agreement::Tolerated) => Resolution::WithinTolerance,
                (_, Agreement::Differs) => Resolution::Conflict,
            };
            if resolution == Resolution::Conflict {
                conflicts += 1;
                debug!(attribute = %attr, chosen = %chosen.source, "Resolved conflicting attribute by priority");
            }

            record.provenance.attributes.insert(
                attr,
                AttributeProvenance {
                    resolution,
                    chosen: chosen.source,
                    contributors: supplied.iter().map(|s| s.source).collect(),
                    alternatives,
                },
            );
            record.set(attr, chosen.value);
        }

        // unmapped source fields, first writer in default priority order wins
        let order = self.config.priority.default_order();
        let mut ordered: Vec<&&Entry<'_>> = members.iter().collect();
        ordered.sort_by_key(|m| {
            let position = order.iter().position(|s| *s == m.record.source).unwrap_or(order.len());
            (position, m.record.source)
        });
        for m in ordered {
            for (k, v) in &m.record.raw_fields {
                record.raw_fields.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        if record.launch_time.is_none() {
            record.flag(RecordFlag::MissingLaunchTime);
        }
        if members.iter().any(|m| !m.record.issues.is_empty()) {
            record.flag(RecordFlag::UnparseableFields);
        }

        (record, conflicts)
    }
}

fn time_agreement(a: &LaunchTime, b: &LaunchTime) -> Agreement {
    if a.instant == b.instant {
        return Agreement::Same;
    }
    let either_date_only = a.precision == TimePrecision::Date || b.precision == TimePrecision::Date;
    if (either_date_only && a.date() == b.date()) || a.gap(b).num_seconds() <= TIME_AGREEMENT_SECS {
        Agreement::Tolerated
    } else {
        Agreement::Differs
    }
}

fn pad_agreement(a: &PadLocation, b: &PadLocation) -> Agreement {
    if a == b {
        return Agreement::Same;
    }
    if let (Some(na), Some(nb)) = (a.site_name.as_deref(), b.site_name.as_deref()) {
        if texts_agree(na, nb) {
            return Agreement::Tolerated;
        }
    }
    if let (Some(ca), Some(cb)) = (a.coordinates, b.coordinates) {
        if haversine_m(ca, cb) <= PAD_AGREEMENT_M {
            return Agreement::Tolerated;
        }
    }
    Agreement::Differs
}

/// Stable identity key: normalized resolved name + resolved UTC launch date
fn identity_key(record: &CanonicalRecord) -> String {
    let date = match record.launch_time {
        Some(t) => t.date().format("%Y-%m-%d").to_string(),
        None => {
            let source = record
                .provenance
                .members
                .first()
                .map(|m| m.source.as_str())
                .unwrap_or("unknown");
            format!("undated:{source}")
        }
    };
    format!("{}|{}", normalize_name(&record.mission_name), date)
}

/// Assign v5 ids; identical keys are told apart by member fingerprints, never by input order
fn assign_launch_ids(records: &mut [CanonicalRecord]) {
    let mut by_key: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        by_key.entry(identity_key(record)).or_default().push(i);
    }
    for (key, mut indexes) in by_key {
        indexes.sort_by_key(|&i| member_signature(&records[i]));
        for (n, &i) in indexes.iter().enumerate() {
            let key = if n == 0 { key.clone() } else { format!("{key}#{}", n + 1) };
            records[i].launch_id = Uuid::new_v5(&LAUNCH_NAMESPACE, key.as_bytes());
        }
    }
}

fn member_signature(record: &CanonicalRecord) -> Vec<String> {
    let mut fingerprints: Vec<String> = record
        .provenance
        .members
        .iter()
        .map(|m| m.fingerprint.clone())
        .collect();
    fingerprints.sort();
    fingerprints
}

impl Reconciler for RecordReconciler {
    #[instrument(skip_all, fields(records = records.len()))]
    fn reconcile(&self, records: &[RawRecord]) -> ReconcileOutput {
        let mut diagnostics = BatchDiagnostics {
            raw_records: records.len(),
            ..Default::default()
        };
        ReconcileMetrics::record_batch_input(records.len());

        // Content order, so nothing below depends on input position
        let mut entries: Vec<Entry<'_>> = records
            .iter()
            .map(|record| Entry {
                fingerprint: record.fingerprint(),
                record,
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.record.source, &a.fingerprint).cmp(&(b.record.source, &b.fingerprint))
        });

        for entry in &entries {
            for issue in &entry.record.issues {
                diagnostics.push(
                    DiagnosticKind::UnparseableRecord,
                    &entry.fingerprint,
                    format!(
                        "{} record '{}': {} {} ({})",
                        entry.record.source,
                        entry.record.mission_name,
                        issue.field,
                        issue.raw_value.as_deref().unwrap_or("<missing>"),
                        issue.reason
                    ),
                );
            }
        }

        let mut candidates = self.candidates(&entries);
        let mut groups = UnionFind::new(entries.len());
        for c in &candidates {
            groups.union(c.left, c.right);
        }
        let mut component_size = vec![0usize; entries.len()];
        for i in 0..entries.len() {
            let root = groups.find(i);
            component_size[root] += 1;
        }

        // Greedy one-to-one pairing in preference order
        candidates.sort_by(|a, b| a.preference(b));
        let mut partner: Vec<Option<(usize, MatchConfidence)>> = vec![None; entries.len()];
        for c in &candidates {
            if partner[c.left].is_none() && partner[c.right].is_none() {
                partner[c.left] = Some((c.right, c.confidence));
                partner[c.right] = Some((c.left, c.confidence));
                debug!(
                    confidence = %c.confidence,
                    similarity = c.similarity,
                    gap_secs = c.gap_secs,
                    "Paired '{}' with '{}'",
                    entries[c.left].record.mission_name,
                    entries[c.right].record.mission_name
                );
            }
        }

        let mut canonical = Vec::new();
        for i in 0..entries.len() {
            match partner[i] {
                Some((j, confidence)) if i < j => {
                    let (record, conflicts) = self.merge(&[&entries[i], &entries[j]], confidence);
                    diagnostics.conflicts += conflicts;
                    match confidence {
                        MatchConfidence::Exact => diagnostics.matched_exact += 1,
                        _ => diagnostics.matched_fuzzy += 1,
                    }
                    canonical.push(record);
                }
                Some(_) => {}
                None => {
                    let (mut record, _) = self.merge(&[&entries[i]], MatchConfidence::Unmatched);
                    if component_size[groups.find(i)] > 1 {
                        record.flag(RecordFlag::AmbiguousMatch);
                        diagnostics.push(
                            DiagnosticKind::AmbiguousMatch,
                            &entries[i].fingerprint,
                            format!(
                                "{} record '{}' had candidates that were paired elsewhere",
                                entries[i].record.source, entries[i].record.mission_name
                            ),
                        );
                    }
                    diagnostics.unmatched += 1;
                    canonical.push(record);
                }
            }
        }

        assign_launch_ids(&mut canonical);
        canonical.sort_by(|a, b| {
            let ka = (a.launch_time.is_none(), a.launch_time.map(|t| t.instant), a.launch_id);
            let kb = (b.launch_time.is_none(), b.launch_time.map(|t| t.instant), b.launch_id);
            ka.cmp(&kb)
        });

        for record in &canonical {
            ReconcileMetrics::record_canonical(record.match_confidence);
        }
        ReconcileMetrics::record_conflicts(diagnostics.conflicts);
        info!(
            canonical = canonical.len(),
            exact = diagnostics.matched_exact,
            fuzzy = diagnostics.matched_fuzzy,
            unmatched = diagnostics.unmatched,
            "Reconciliation complete"
        );

        ReconcileOutput {
            records: canonical,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Outcome, ParseIssue, SourceId};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn api(name: &str, y: i32, m: u32, d: u32, h: u32) -> RawRecord {
        let mut r = RawRecord::new(SourceId::Api, name);
        r.launch_time = Some(LaunchTime::exact(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()));
        r
    }

    fn scrape(name: &str, y: i32, m: u32, d: u32) -> RawRecord {
        let mut r = RawRecord::new(SourceId::Scrape, name);
        r.launch_time = Some(LaunchTime::date_only(NaiveDate::from_ymd_opt(y, m, d).unwrap()));
        r
    }

    #[test]
    fn test_fuzzy_pair_across_sources() {
        let mut a = api("Falcon 9 Block 5", 2020, 6, 1, 0);
        a.outcome = Outcome::Success;
        let mut s = scrape("falcon  9 block 5", 2020, 6, 1);
        s.outcome = Outcome::Success;

        let out = RecordReconciler::default().reconcile(&[a, s]);
        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert_eq!(record.match_confidence, MatchConfidence::Fuzzy);
        assert_eq!(record.outcome, Outcome::Success);
        assert!(record.provenance.cites(SourceId::Api));
        assert!(record.provenance.cites(SourceId::Scrape));
        assert_eq!(
            record.provenance.attribute(Attribute::Outcome).unwrap().contributors,
            vec![SourceId::Api, SourceId::Scrape]
        );
        assert_eq!(out.diagnostics.matched_fuzzy, 1);
    }

    #[test]
    fn test_exact_key_ignores_name_and_time() {
        let mut a = api("CRS-20", 2020, 3, 7, 4);
        a.external_key = Some("5eb87d42ffd86e000604b384".into());
        let mut s = scrape("SpX-20", 2020, 3, 20);
        s.external_key = Some("5eb87d42ffd86e000604b384".into());

        let out = RecordReconciler::default().reconcile(&[s, a]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].match_confidence, MatchConfidence::Exact);
        // API wins the name by default priority
        assert_eq!(out.records[0].mission_name, "CRS-20");
        assert!(out.records[0].provenance.cites(SourceId::Api));
        assert!(out.records[0].provenance.cites(SourceId::Scrape));
    }

    #[test]
    fn test_outside_time_window_stays_unmatched() {
        let a = api("Starlink 7", 2020, 4, 22, 19);
        let s = scrape("Starlink 7", 2020, 4, 25);
        let out = RecordReconciler::default().reconcile(&[a, s]);
        assert_eq!(out.records.len(), 2);
        assert!(out.records.iter().all(|r| r.match_confidence == MatchConfidence::Unmatched));
        assert_ne!(out.records[0].launch_id, out.records[1].launch_id);
    }

    #[test]
    fn test_payload_conflict_kept_for_audit() {
        let mut a = api("ANASIS-II", 2020, 7, 20, 21);
        a.payload_mass_kg = Some(4500.0);
        let mut s = scrape("ANASIS-II", 2020, 7, 20);
        s.payload_mass_kg = Some(4550.0);

        let out = RecordReconciler::default().reconcile(&[a, s]);
        let record = &out.records[0];
        assert_eq!(record.payload_mass_kg, Some(4500.0));
        let prov = record.provenance.attribute(Attribute::PayloadMassKg).unwrap();
        assert_eq!(prov.chosen, SourceId::Api);
        assert_eq!(prov.alternatives.len(), 1);
        assert_eq!(prov.alternatives[0].source, SourceId::Scrape);
        assert_eq!(prov.alternatives[0].value, AttributeValue::Number(4550.0));
    }

    #[test]
    fn test_payload_within_tolerance() {
        let mut a = api("SAOCOM 1B", 2020, 8, 30, 23);
        a.payload_mass_kg = Some(3000.0);
        let mut s = scrape("SAOCOM 1B", 2020, 8, 30);
        s.payload_mass_kg = Some(3020.0);

        let out = RecordReconciler::default().reconcile(&[a, s]);
        let prov = out.records[0].provenance.attribute(Attribute::PayloadMassKg).unwrap();
        assert_eq!(prov.resolution, Resolution::WithinTolerance);
        assert_eq!(prov.contributors.len(), 2);
        assert_eq!(out.diagnostics.conflicts, 0);
    }

    #[test]
    fn test_flight_numbers_must_match_exactly() {
        let mut a = api("Starlink 9", 2020, 7, 7, 5);
        a.flight_number = Some(100);
        let mut s = scrape("Starlink 9", 2020, 7, 7);
        s.flight_number = Some(101);

        let out = RecordReconciler::default().reconcile(&[a, s]);
        let record = &out.records[0];
        let prov = record.provenance.attribute(Attribute::FlightNumber).unwrap();
        assert_eq!(prov.resolution, Resolution::Conflict);
        assert_eq!(record.flight_number, Some(100));
        assert_eq!(out.diagnostics.conflicts, 1);
    }

    #[test]
    fn test_unparseable_record_is_kept_unmatched() {
        let a = api("GPS III SV03", 2020, 6, 30, 20);
        let mut s = RawRecord::new(SourceId::Scrape, "GPS III SV03");
        s.issues.push(ParseIssue {
            field: Attribute::LaunchTime,
            raw_value: Some("June ??, 2020".into()),
            reason: "unrecognized date".into(),
        });

        let out = RecordReconciler::default().reconcile(&[a, s]);
        assert_eq!(out.records.len(), 2);
        let undated = out.records.iter().find(|r| r.launch_time.is_none()).unwrap();
        assert_eq!(undated.match_confidence, MatchConfidence::Unmatched);
        assert!(undated.has_flag(RecordFlag::MissingLaunchTime));
        assert!(undated.has_flag(RecordFlag::UnparseableFields));
        // nulls sort last
        assert!(out.records[1].launch_time.is_none());
        assert_eq!(out.diagnostics.count(DiagnosticKind::UnparseableRecord), 1);
    }

    #[test]
    fn test_ambiguous_candidates_pair_once() {
        let a1 = api("Starlink 12", 2020, 10, 6, 11);
        let a2 = api("Starlink 13", 2020, 10, 6, 23);
        let s = scrape("Starlink 12", 2020, 10, 6);

        let out = RecordReconciler::default().reconcile(&[a1, a2, s]);
        assert_eq!(out.records.len(), 2);
        let paired = out
            .records
            .iter()
            .find(|r| r.match_confidence == MatchConfidence::Fuzzy)
            .unwrap();
        assert_eq!(paired.mission_name, "Starlink 12");
        let leftover = out
            .records
            .iter()
            .find(|r| r.match_confidence == MatchConfidence::Unmatched)
            .unwrap();
        assert!(leftover.has_flag(RecordFlag::AmbiguousMatch));
        assert_eq!(out.diagnostics.count(DiagnosticKind::AmbiguousMatch), 1);
    }

    #[test]
    fn test_identity_collisions_get_distinct_ids() {
        let a = scrape("Starlink", 2021, 1, 20);
        let mut b = scrape("Starlink", 2021, 1, 20);
        b.flight_number = Some(2);

        let out = RecordReconciler::default().reconcile(&[a.clone(), b.clone()]);
        assert_eq!(out.records.len(), 2);
        assert_ne!(out.records[0].launch_id, out.records[1].launch_id);

        let again = RecordReconciler::default().reconcile(&[b, a]);
        let mut ids: Vec<_> = out.records.iter().map(|r| r.launch_id).collect();
        let mut ids_again: Vec<_> = again.records.iter().map(|r| r.launch_id).collect();
        ids.sort();
        ids_again.sort();
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn test_description_prefers_scrape() {
        let mut a = api("Crew-1", 2020, 11, 16, 0);
        a.description = Some("Crew rotation".into());
        let mut s = scrape("Crew-1", 2020, 11, 16);
        s.description = Some("First operational Crew Dragon flight".into());

        let out = RecordReconciler::default().reconcile(&[a, s]);
        let record = &out.records[0];
        assert_eq!(record.description.as_deref(), Some("First operational Crew Dragon flight"));
        let prov = record.provenance.attribute(Attribute::Description).unwrap();
        assert_eq!(prov.resolution, Resolution::Conflict);
        assert_eq!(prov.chosen, SourceId::Scrape);
    }
}
