use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use super::{http_client, json_rows, PayloadSource, SourceAdapter};
use crate::config::ApiSourceConfig;
use crate::domain::{
    Attribute, GeoPoint, LaunchTime, Outcome, PadLocation, ParseIssue, RawRecord, SourceId,
};
use crate::error::Result;

/// Fields mapped onto RawRecord attributes; everything else lands in `raw_fields`
const MAPPED_FIELDS: &[&str] = &[
    "id",
    "name",
    "date_utc",
    "date_precision",
    "rocket",
    "success",
    "details",
    "flight_number",
    "launchpad",
    "payload_mass_kg",
];

/// Structured launch feed in the SpaceX v4 launch schema
pub struct SpacexApiAdapter {
    payload: PayloadSource,
    client: reqwest::Client,
    rocket_names: BTreeMap<String, String>,
    launchpad_names: BTreeMap<String, String>,
}

impl SpacexApiAdapter {
    pub fn new(payload: PayloadSource, config: &ApiSourceConfig) -> Result<Self> {
        Ok(Self {
            payload,
            client: http_client()?,
            rocket_names: config.rocket_names.clone(),
            launchpad_names: config.launchpad_names.clone(),
        })
    }

    fn launch_time(&self, row: &Value, issues: &mut Vec<ParseIssue>) -> Option<LaunchTime> {
        let Some(raw) = row.get("date_utc").and_then(Value::as_str) else {
            issues.push(issue(Attribute::LaunchTime, None, "date_utc missing"));
            return None;
        };
        let instant = match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                issues.push(issue(Attribute::LaunchTime, Some(raw), &e.to_string()));
                return None;
            }
        };
        // Coarser precisions are reported as the first instant of the period
        match row.get("date_precision").and_then(Value::as_str) {
            None | Some("hour") => Some(LaunchTime::exact(instant)),
            Some(_) => Some(LaunchTime::date_only(instant.date_naive())),
        }
    }

    fn rocket_variant(&self, row: &Value, issues: &mut Vec<ParseIssue>) -> Option<String> {
        match row.get("rocket") {
            Some(Value::String(code)) => match self.rocket_names.get(code) {
                Some(name) => Some(name.clone()),
                None => {
                    issues.push(issue(Attribute::RocketVariant, Some(code), "unknown rocket id"));
                    None
                }
            },
            Some(Value::Object(rocket)) => rocket.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }

    fn pad_location(&self, row: &Value) -> Option<PadLocation> {
        match row.get("launchpad") {
            Some(Value::String(code)) => Some(PadLocation::named(
                self.launchpad_names.get(code).cloned().unwrap_or_else(|| code.clone()),
            )),
            Some(Value::Object(pad)) => {
                let site_name = pad.get("name").and_then(Value::as_str).map(str::to_string);
                let coordinates = match (
                    pad.get("latitude").and_then(Value::as_f64),
                    pad.get("longitude").and_then(Value::as_f64),
                ) {
                    (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)).filter(GeoPoint::is_valid),
                    _ => None,
                };
                Some(PadLocation { site_name, coordinates }).filter(|p| !p.is_empty())
            }
            _ => None,
        }
    }
}

fn issue(field: Attribute, raw: Option<&str>, reason: &str) -> ParseIssue {
    ParseIssue {
        field,
        raw_value: raw.map(str::to_string),
        reason: reason.to_string(),
    }
}

/// First element of an embedded array such as `cores` or `payloads`. Bare id strings
/// (an unpopulated feed) carry no fields and yield None.
fn first_object<'a>(row: &'a Value, key: &str) -> Option<&'a Value> {
    row.get(key)?.as_array()?.first().filter(|v| v.is_object())
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)?
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Booster serial from the first core, when the feed carries serials
fn booster_serial(row: &Value) -> Option<String> {
    text_field(first_object(row, "cores")?, "serial")
}

/// First-stage recovery in the scraped table's wording: "Success (ASDS)", "Failure (RTLS)",
/// "No attempt". An attempt without a reported result is unknown.
fn booster_landing(row: &Value) -> Option<String> {
    let core = first_object(row, "cores")?;
    if !core.get("landing_attempt")?.as_bool()? {
        return Some("No attempt".to_string());
    }
    let result = match core.get("landing_success").and_then(Value::as_bool)? {
        true => "Success",
        false => "Failure",
    };
    Some(match text_field(core, "landing_type") {
        Some(kind) => format!("{result} ({kind})"),
        None => result.to_string(),
    })
}

fn orbit(row: &Value) -> Option<String> {
    text_field(first_object(row, "payloads")?, "orbit")
}

fn customer(row: &Value) -> Option<String> {
    first_object(row, "payloads")?
        .get("customers")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SourceAdapter for SpacexApiAdapter {
    fn source(&self) -> SourceId {
        SourceId::Api
    }

    #[instrument(skip(self), fields(payload = %self.payload))]
    async fn fetch(&self) -> Result<Vec<Value>> {
        debug!("Fetching API launch payload");
        let text = self.payload.load_text(&self.client).await?;
        json_rows(SourceId::Api, &text)
    }

    fn normalize(&self, row: &Value) -> RawRecord {
        let mut issues = Vec::new();

        let name = row.get("name").and_then(Value::as_str).unwrap_or_default().trim();
        if name.is_empty() {
            issues.push(issue(Attribute::MissionName, None, "name missing"));
        }
        let mut record = RawRecord::new(SourceId::Api, name);
        record.external_key = row.get("id").and_then(Value::as_str).map(str::to_string);
        record.launch_time = self.launch_time(row, &mut issues);
        record.rocket_variant = self.rocket_variant(row, &mut issues);
        record.pad_location = self.pad_location(row);
        record.booster_serial = booster_serial(row);
        record.booster_landing = booster_landing(row);
        record.orbit = orbit(row);
        record.customer = customer(row);
        record.outcome = Outcome::from_flag(row.get("success").and_then(Value::as_bool));
        record.flight_number = row
            .get("flight_number")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());
        record.description = row
            .get("details")
            .and_then(Value::as_str)
            .map(str::to_string);

        match row.get("payload_mass_kg") {
            None | Some(Value::Null) => {}
            Some(v) => match v.as_f64().filter(|m| m.is_finite() && *m >= 0.0) {
                Some(mass) => record.payload_mass_kg = Some(mass),
                None => issues.push(issue(Attribute::PayloadMassKg, Some(&v.to_string()), "not a mass")),
            },
        }

        if let Some(fields) = row.as_object() {
            for (key, value) in fields {
                if !MAPPED_FIELDS.contains(&key.as_str()) {
                    record.raw_fields.insert(key.clone(), value.clone());
                }
            }
        }
        record.issues = issues;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TimePrecision;
    use serde_json::json;

    fn adapter() -> SpacexApiAdapter {
        SpacexApiAdapter::new(PayloadSource::parse("unused.json"), &ApiSourceConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_full_launch() {
        let row = json!({
            "id": "5eb87d46ffd86e000604b388",
            "name": "Starlink-7",
            "date_utc": "2020-05-09T03:32:00.000Z",
            "date_precision": "hour",
            "rocket": "5e9d0d95eda69973a809d1ec",
            "success": true,
            "details": null,
            "flight_number": 88,
            "launchpad": "5e9e4501f509094ba4566f84",
            "cores": [{"core": "5e9e28a2f3591817f23b2663", "serial": "B1049", "flight": 5}],
            "upcoming": false
        });
        let record = adapter().normalize(&row);

        assert_eq!(record.source, SourceId::Api);
        assert_eq!(record.mission_name, "Starlink-7");
        assert_eq!(record.external_key.as_deref(), Some("5eb87d46ffd86e000604b388"));
        assert_eq!(record.launch_time.unwrap().precision, TimePrecision::Time);
        assert_eq!(record.rocket_variant.as_deref(), Some("Falcon 9"));
        assert_eq!(record.booster_serial.as_deref(), Some("B1049"));
        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(record.flight_number, Some(88));
        assert_eq!(
            record.pad_location.unwrap().site_name.as_deref(),
            Some("CCSFS SLC 40")
        );
        assert_eq!(record.description, None);
        assert_eq!(record.booster_landing, None);
        assert_eq!(record.orbit, None);
        assert!(record.raw_fields.contains_key("cores"));
        assert!(record.raw_fields.contains_key("upcoming"));
        assert!(record.issues.is_empty());
    }

    #[test]
    fn test_embedded_payload_and_core_details() {
        let row = json!({
            "name": "CRS-20",
            "date_utc": "2020-03-07T04:50:31.000Z",
            "payloads": [{"name": "Dragon", "orbit": "ISS", "customers": ["", "NASA (CRS)"]}],
            "cores": [{"serial": "B1059", "landing_attempt": true, "landing_success": true, "landing_type": "RTLS"}]
        });
        let record = adapter().normalize(&row);
        assert_eq!(record.orbit.as_deref(), Some("ISS"));
        assert_eq!(record.customer.as_deref(), Some("NASA (CRS)"));
        assert_eq!(record.booster_landing.as_deref(), Some("Success (RTLS)"));
        assert!(record.issues.is_empty());
    }

    #[test]
    fn test_booster_landing_wording() {
        let landing = |core: Value| booster_landing(&json!({ "cores": [core] }));
        assert_eq!(landing(json!({"landing_attempt": false})).as_deref(), Some("No attempt"));
        assert_eq!(
            landing(json!({"landing_attempt": true, "landing_success": false, "landing_type": "ASDS"})).as_deref(),
            Some("Failure (ASDS)")
        );
        assert_eq!(landing(json!({"landing_attempt": true, "landing_success": null})), None);
        assert_eq!(landing(json!({"landing_attempt": null})), None);
        assert_eq!(booster_landing(&json!({"cores": ["5e9e28a2f3591817f23b2663"]})), None);
    }

    #[test]
    fn test_null_success_is_unknown() {
        let row = json!({"name": "Crew-9", "date_utc": "2024-09-28T17:17:00.000Z", "success": null});
        assert_eq!(adapter().normalize(&row).outcome, Outcome::Unknown);
    }

    #[test]
    fn test_day_precision_is_date_only() {
        let row = json!({"name": "TBD", "date_utc": "2022-11-01T00:00:00.000Z", "date_precision": "month"});
        let record = adapter().normalize(&row);
        assert_eq!(record.launch_time.unwrap().precision, TimePrecision::Date);
    }

    #[test]
    fn test_bad_date_becomes_issue() {
        let row = json!({"name": "FalconSat", "date_utc": "March 24 2006"});
        let record = adapter().normalize(&row);
        assert!(record.launch_time.is_none());
        assert!(record.has_issue(Attribute::LaunchTime));
        assert!(!record.is_matchable());
    }

    #[test]
    fn test_embedded_launchpad_coordinates() {
        let row = json!({
            "name": "Demo",
            "date_utc": "2021-01-01T00:00:00Z",
            "launchpad": {"name": "KSC LC 39A", "latitude": 28.6080585, "longitude": -80.6039558}
        });
        let pad = adapter().normalize(&row).pad_location.unwrap();
        assert_eq!(pad.site_name.as_deref(), Some("KSC LC 39A"));
        assert!(pad.coordinates.is_some());
    }

    #[test]
    fn test_unknown_rocket_id_is_issue() {
        let row = json!({"name": "X", "date_utc": "2021-01-01T00:00:00Z", "rocket": "deadbeef"});
        let record = adapter().normalize(&row);
        assert!(record.rocket_variant.is_none());
        assert!(record.has_issue(Attribute::RocketVariant));
        // still matchable: only name and time gate matching
        assert!(record.is_matchable());
    }
}
