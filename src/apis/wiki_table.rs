use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::{http_client, json_rows, PayloadSource, SourceAdapter};
use crate::constants::{LB_TO_KG, MISSING_VALUE_MARKERS};
use crate::domain::{Attribute, LaunchTime, Outcome, PadLocation, ParseIssue, RawRecord, SourceId};
use crate::error::{ReconError, Result};

/// Column carrying the free-text row that follows each launch in the HTML table
pub const DESCRIPTION_COLUMN: &str = "Description";

static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table.wikitable").expect("valid selector"));
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").expect("valid selector"));
static HEADER_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th").expect("valid selector"));

static CITATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static KG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\d,]+(?:\.\d+)?)\s*kg").expect("valid regex"));
static LB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\d,]+(?:\.\d+)?)\s*lb").expect("valid regex"));
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[~≈]?\s*([\d,]+(?:\.\d+)?)$").expect("valid regex"));
static SERIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"B\d{4}").expect("valid regex"));
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

const EXACT_FORMATS: &[&str] = &["%B %d, %Y %H:%M", "%B %d, %Y, %H:%M", "%d %B %Y %H:%M", "%d %B %Y, %H:%M"];
const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%d %B %Y", "%Y-%m-%d", "%m/%d/%Y"];

/// Shorthand used in version cells
const VARIANT_WORDS: &[(&str, &str)] = &[
    ("F9", "Falcon 9"),
    ("FH", "Falcon Heavy"),
    ("B5", "Block 5"),
    ("FT", "Full Thrust"),
];

/// How a table column maps onto RawRecord attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Key,
    FlightNumber,
    LaunchTime,
    Version,
    Site,
    Payload,
    PayloadMass,
    Outcome,
    Orbit,
    Customer,
    BoosterLanding,
    Description,
    Other,
}

fn classify(header: &str) -> Column {
    let h = header.trim().to_lowercase();
    match h.as_str() {
        "id" => Column::Key,
        "description" => Column::Description,
        "launch site" => Column::Site,
        "payload mass" => Column::PayloadMass,
        "payload" => Column::Payload,
        "launch outcome" | "outcome" => Column::Outcome,
        "orbit" => Column::Orbit,
        "customer" | "customers" => Column::Customer,
        "booster landing" | "landing" | "landing outcome" => Column::BoosterLanding,
        _ if h.starts_with("flight no") => Column::FlightNumber,
        _ if h.starts_with("date") => Column::LaunchTime,
        _ if h.starts_with("version") => Column::Version,
        _ => Column::Other,
    }
}

/// Free text with citation markers removed and whitespace collapsed
pub fn clean_text(raw: &str) -> String {
    let stripped = CITATION_RE.replace_all(raw, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

fn snake_case(header: &str) -> String {
    header
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

fn is_missing(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    MISSING_VALUE_MARKERS.contains(&v.as_str())
}

/// Trimmed text, or None for a missing-value marker
fn reported(text: String) -> Option<String> {
    Some(text).filter(|t| !is_missing(t))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    clean_text(&cell.text().collect::<String>())
}

/// Rows of the launch table, one JSON object per launch keyed by header text.
/// The single-cell row that follows a launch is attached as its `Description`.
pub fn table_rows(html: &str) -> Result<Vec<Value>> {
    let document = Html::parse_document(html);
    let tables: Vec<ElementRef<'_>> = document.select(&TABLE_SELECTOR).collect();
    if tables.is_empty() {
        return Err(ReconError::Html("no wikitable found".into()));
    }
    let table = tables
        .iter()
        .copied()
        .find(|t| {
            t.select(&HEADER_SELECTOR)
                .any(|th| th.text().collect::<String>().contains("Flight No."))
        })
        .unwrap_or(tables[0]);

    let mut header: Vec<String> = Vec::new();
    let mut rows: Vec<Map<String, Value>> = Vec::new();
    let mut skipped = 0usize;
    let mut last_was_data = false;

    for tr in table.select(&ROW_SELECTOR) {
        let cells: Vec<ElementRef<'_>> = tr.select(&CELL_SELECTOR).collect();
        if header.is_empty() {
            if !cells.is_empty() && cells.iter().all(|c| c.value().name() == "th") {
                header = cells.into_iter().map(cell_text).collect();
            }
            continue;
        }
        if cells.len() == header.len() {
            let row = header
                .iter()
                .zip(cells)
                .map(|(name, cell)| (name.clone(), Value::String(cell_text(cell))))
                .collect();
            rows.push(row);
            last_was_data = true;
        } else if cells.len() == 1 && last_was_data {
            let text = cell_text(cells[0]);
            if let Some(row) = rows.last_mut() {
                if !text.is_empty() {
                    row.insert(DESCRIPTION_COLUMN.to_string(), Value::String(text));
                }
            }
            last_was_data = false;
        } else {
            skipped += 1;
            last_was_data = false;
        }
    }

    if header.is_empty() {
        return Err(ReconError::Html("launch table has no header row".into()));
    }
    if skipped > 0 {
        warn!(skipped, "Skipped table rows whose cell count did not match the header");
    }
    debug!(columns = header.len(), rows = rows.len(), "Extracted launch table");
    Ok(rows.into_iter().map(Value::Object).collect())
}

/// Launch time from a date cell. `Ok(None)` means the cell is empty.
fn parse_launch_time(text: &str) -> std::result::Result<Option<LaunchTime>, &'static str> {
    if is_missing(text) {
        return Ok(None);
    }
    for format in EXACT_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Some(LaunchTime::exact(t.and_utc())));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return Ok(Some(LaunchTime::date_only(d)));
        }
    }
    Err("unrecognized date format")
}

/// Mass in kilograms. Prefers an explicit kg figure, then pounds, then a bare number.
fn parse_mass_kg(text: &str) -> std::result::Result<Option<f64>, &'static str> {
    if is_missing(text) {
        return Ok(None);
    }
    let number = |m: &str| m.replace(',', "").parse::<f64>().ok();
    if let Some(kg) = KG_RE.captures(text).and_then(|c| number(&c[1])) {
        return Ok(Some(kg));
    }
    if let Some(lb) = LB_RE.captures(text).and_then(|c| number(&c[1])) {
        return Ok(Some(lb * LB_TO_KG));
    }
    NUMBER_RE
        .captures(text)
        .and_then(|c| number(&c[1]))
        .map(Some)
        .ok_or("no mass figure")
}

fn parse_outcome(text: &str) -> Outcome {
    let t = text.to_lowercase();
    if t.contains("fail") {
        Outcome::Failure
    } else if t.contains("success") {
        Outcome::Success
    } else {
        Outcome::Unknown
    }
}

/// Rocket variant and booster serial from a version cell such as "F9 B5 B1049.4"
fn parse_version(text: &str) -> (Option<String>, Option<String>) {
    let (variant_part, serial) = match SERIAL_RE.find(text) {
        Some(m) => (&text[..m.start()], Some(m.as_str().to_string())),
        None => (text, None),
    };
    let variant = variant_part
        .split_whitespace()
        .map(|word| {
            VARIANT_WORDS
                .iter()
                .find(|(short, _)| short.eq_ignore_ascii_case(word))
                .map(|(_, long)| *long)
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ");
    (Some(variant).filter(|v| !v.is_empty() && !is_missing(v)), serial)
}

fn issue(field: Attribute, raw: &str, reason: &str) -> ParseIssue {
    ParseIssue {
        field,
        raw_value: Some(raw.to_string()),
        reason: reason.to_string(),
    }
}

/// Launch list scraped from an encyclopedia table, or the same rows as a JSON array
pub struct WikiTableAdapter {
    payload: PayloadSource,
    client: reqwest::Client,
}

impl WikiTableAdapter {
    pub fn new(payload: PayloadSource) -> Result<Self> {
        Ok(Self {
            payload,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl SourceAdapter for WikiTableAdapter {
    fn source(&self) -> SourceId {
        SourceId::Scrape
    }

    #[instrument(skip(self), fields(payload = %self.payload))]
    async fn fetch(&self) -> Result<Vec<Value>> {
        let text = self.payload.load_text(&self.client).await?;
        if text.trim_start().starts_with('[') {
            return json_rows(SourceId::Scrape, &text);
        }
        let rows = table_rows(&text)?;
        info!("Found {} launch rows in scraped table", rows.len());
        Ok(rows)
    }

    fn normalize(&self, row: &Value) -> RawRecord {
        let mut record = RawRecord::new(SourceId::Scrape, "");
        let Some(fields) = row.as_object() else {
            record.issues.push(issue(Attribute::MissionName, &row.to_string(), "row is not an object"));
            return record;
        };

        for (header, value) in fields {
            let text = match value {
                Value::String(s) => clean_text(s),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            match classify(header) {
                Column::Key => record.external_key = Some(text).filter(|t| !t.is_empty()),
                Column::FlightNumber => {
                    record.flight_number = INTEGER_RE.find(&text).and_then(|m| m.as_str().parse().ok());
                }
                Column::LaunchTime => match parse_launch_time(&text) {
                    Ok(t) => record.launch_time = t,
                    Err(reason) => record.issues.push(issue(Attribute::LaunchTime, &text, reason)),
                },
                Column::Version => {
                    let (variant, serial) = parse_version(&text);
                    record.rocket_variant = variant;
                    record.booster_serial = serial;
                }
                Column::Site => {
                    if !is_missing(&text) {
                        record.pad_location = Some(PadLocation::named(text));
                    }
                }
                Column::Payload => record.mission_name = text,
                Column::PayloadMass => match parse_mass_kg(&text) {
                    Ok(m) => record.payload_mass_kg = m,
                    Err(reason) => record.issues.push(issue(Attribute::PayloadMassKg, &text, reason)),
                },
                Column::Outcome => record.outcome = parse_outcome(&text),
                Column::Orbit => record.orbit = reported(text),
                Column::Customer => record.customer = reported(text),
                Column::BoosterLanding => record.booster_landing = reported(text),
                Column::Description => record.description = Some(text).filter(|t| !t.is_empty()),
                Column::Other => {
                    let key = snake_case(header);
                    if !key.is_empty() {
                        record.raw_fields.insert(key, value.clone());
                    }
                }
            }
        }

        if record.mission_name.is_empty() {
            record.issues.push(issue(Attribute::MissionName, "", "payload column missing or empty"));
        }
        record
    }
}
