use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

use launch_recon::domain::{
    Attribute, CanonicalRecord, LaunchTime, MatchConfidence, Outcome, PadLocation, RawRecord, RecordFlag, Resolution, SourceId,
};
use launch_recon::pipeline::processing::{Reconciler, RecordReconciler};
use launch_recon::pipeline::DiagnosticKind;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Option<LaunchTime> {
    Some(LaunchTime::exact(Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()))
}

fn api(name: &str, key: &str, time: Option<LaunchTime>) -> RawRecord {
    let mut r = RawRecord::new(SourceId::Api, name);
    r.external_key = Some(key.to_string());
    r.launch_time = time;
    r.rocket_variant = Some("Falcon 9".into());
    r.outcome = Outcome::Success;
    r
}

fn scrape(name: &str, time: Option<LaunchTime>) -> RawRecord {
    let mut r = RawRecord::new(SourceId::Scrape, name);
    r.launch_time = time;
    r.pad_location = Some(PadLocation::named("CCSFS SLC 40"));
    r
}

/// A batch exercising every matching path: exact keys, fuzzy pairs, ambiguity,
/// unmatched singletons, undated records and an identity collision
fn batch() -> Vec<RawRecord> {
    let mut exact_scrape = scrape("Demo-2", at(2020, 5, 30, 19, 22));
    exact_scrape.external_key = Some("demo2".into());

    let mut heavy = scrape("CRS-20", at(2020, 3, 7, 4, 50));
    heavy.payload_mass_kg = Some(1977.0);
    let mut heavy_api = api("CRS-20", "crs20", at(2020, 3, 7, 4, 50));
    heavy_api.payload_mass_kg = Some(1990.0);

    let mut undated = scrape("Unnamed test flight", None);
    undated.issues.push(launch_recon::domain::ParseIssue {
        field: Attribute::LaunchTime,
        raw_value: Some("TBD".into()),
        reason: "unrecognized date format".into(),
    });

    vec![
        api("Crew Dragon Demo-2", "demo2", at(2020, 5, 30, 19, 22)),
        exact_scrape,
        heavy_api,
        heavy,
        api("Starlink-7", "sl7", at(2020, 5, 9, 3, 32)),
        scrape("Starlink 7", Some(LaunchTime::date_only(NaiveDate::from_ymd_opt(2020, 5, 9).unwrap()))),
        api("Starlink 12", "sl12", at(2020, 10, 6, 11, 29)),
        scrape("Starlink 12", at(2020, 10, 6, 11, 29)),
        scrape("Starlink 13", at(2020, 10, 6, 12, 0)),
        api("ANASIS-II", "anasis", at(2020, 7, 20, 21, 30)),
        scrape("SAOCOM 1B", at(2020, 8, 30, 23, 18)),
        undated,
        // same name and day from one source: two launches, not one
        scrape("Transporter", at(2021, 1, 24, 15, 0)),
        scrape("Transporter", at(2021, 1, 24, 18, 0)),
    ]
}

fn named<'a>(records: &'a [CanonicalRecord], name: &str) -> Vec<&'a CanonicalRecord> {
    records.iter().filter(|r| r.mission_name == name).collect()
}

fn reconcile_json(records: &[RawRecord]) -> Result<(String, String)> {
    let output = RecordReconciler::default().reconcile(records);
    Ok((
        serde_json::to_string(&output.records)?,
        serde_json::to_string(&output.diagnostics)?,
    ))
}

#[test]
fn test_output_independent_of_input_order() -> Result<()> {
    let records = batch();
    let expected = reconcile_json(&records)?;

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..25 {
        let mut shuffled = records.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(reconcile_json(&shuffled)?, expected);
    }
    Ok(())
}

#[test]
fn test_reconcile_is_idempotent() -> Result<()> {
    let records = batch();
    assert_eq!(reconcile_json(&records)?, reconcile_json(&records)?);
    Ok(())
}

#[test]
fn test_every_raw_record_lands_in_exactly_one_canonical_record() {
    let records = batch();
    let output = RecordReconciler::default().reconcile(&records);

    let mut seen = HashSet::new();
    for record in &output.records {
        assert!(!record.provenance.members.is_empty() && record.provenance.members.len() <= 2);
        if record.provenance.members.len() == 2 {
            assert_ne!(record.provenance.members[0].source, record.provenance.members[1].source);
        }
        for member in &record.provenance.members {
            assert!(seen.insert(member.fingerprint.clone()), "record used twice");
        }
    }
    let all: HashSet<String> = records.iter().map(RawRecord::fingerprint).collect();
    assert_eq!(seen, all);

    let ids: HashSet<_> = output.records.iter().map(|r| r.launch_id).collect();
    assert_eq!(ids.len(), output.records.len());
}

#[test]
fn test_batch_scenarios() {
    let output = RecordReconciler::default().reconcile(&batch());
    let find = |name: &str| named(&output.records, name).into_iter();

    let demo = find("Crew Dragon Demo-2").next().unwrap();
    assert_eq!(demo.match_confidence, MatchConfidence::Exact);

    let crs = find("CRS-20").next().unwrap();
    assert_eq!(crs.match_confidence, MatchConfidence::Fuzzy);
    assert_eq!(crs.payload_mass_kg, Some(1990.0));
    assert_eq!(
        crs.provenance.attribute(Attribute::PayloadMassKg).unwrap().resolution,
        Resolution::WithinTolerance
    );

    // date-only scrape time agrees with the exact API time on the same day
    let starlink7 = find("Starlink-7").next().unwrap();
    assert_eq!(starlink7.match_confidence, MatchConfidence::Fuzzy);
    assert_eq!(
        starlink7.provenance.attribute(Attribute::LaunchTime).unwrap().resolution,
        Resolution::WithinTolerance
    );

    let loser = find("Starlink 13").next().unwrap();
    assert_eq!(loser.match_confidence, MatchConfidence::Unmatched);
    assert!(loser.has_flag(RecordFlag::AmbiguousMatch));
    assert_eq!(output.diagnostics.count(DiagnosticKind::AmbiguousMatch), 1);

    let undated = find("Unnamed test flight").next().unwrap();
    assert!(undated.has_flag(RecordFlag::MissingLaunchTime));
    assert!(undated.has_flag(RecordFlag::UnparseableFields));
    assert_eq!(output.diagnostics.count(DiagnosticKind::UnparseableRecord), 1);
    assert_eq!(output.records.last().map(|r| r.launch_id), Some(undated.launch_id));

    let transporters: Vec<_> = find("Transporter").collect();
    assert_eq!(transporters.len(), 2);
    assert_ne!(transporters[0].launch_id, transporters[1].launch_id);

    assert_eq!(output.diagnostics.raw_records, 14);
    assert_eq!(output.diagnostics.matched_exact, 1);
    assert_eq!(output.diagnostics.matched_fuzzy, 3);
}

#[test]
fn test_matched_records_cite_both_sources() {
    let output = RecordReconciler::default().reconcile(&batch());
    assert!(output.records.iter().any(|r| r.match_confidence == MatchConfidence::Exact));

    for record in &output.records {
        let provenance = &record.provenance;
        match record.match_confidence {
            MatchConfidence::Exact | MatchConfidence::Fuzzy => {
                assert!(provenance.cites(SourceId::Api), "{} lacks an api member", record.mission_name);
                assert!(provenance.cites(SourceId::Scrape), "{} lacks a scrape member", record.mission_name);
                assert_eq!(provenance.members.len(), 2);
            }
            MatchConfidence::Unmatched => assert_eq!(provenance.members.len(), 1),
        }
    }
}
