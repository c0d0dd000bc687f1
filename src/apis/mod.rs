// Source adapters: fetch a raw payload and normalize each row into a RawRecord

pub mod spacex_api;
pub mod wiki_table;

pub use spacex_api::SpacexApiAdapter;
pub use wiki_table::WikiTableAdapter;

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::constants::{HTTP_TIMEOUT_SECS, HTTP_USER_AGENT};
use crate::domain::{RawRecord, SourceId};
use crate::error::{ReconError, Result};
use crate::metrics::SourcesMetrics;

/// Where a source payload lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    File(PathBuf),
    Url(String),
}

impl PayloadSource {
    /// `http://` and `https://` locations are URLs, everything else is a path
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    pub async fn load_text(&self, client: &reqwest::Client) -> Result<String> {
        match self {
            Self::File(path) => Ok(tokio::fs::read_to_string(path).await?),
            Self::Url(url) => {
                let response = client.get(url).send().await?.error_for_status()?;
                Ok(response.text().await?)
            }
        }
    }
}

impl std::fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(HTTP_USER_AGENT)
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

/// Core trait every launch source implements
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceId;

    /// Raw payload rows, one JSON value per launch
    async fn fetch(&self) -> Result<Vec<Value>>;

    /// Never fails: values that cannot be parsed are nulled and recorded as issues
    fn normalize(&self, row: &Value) -> RawRecord;

    /// Fetch and normalize. A failed fetch or an empty payload is `SourceUnavailable`.
    async fn collect(&self) -> Result<Vec<RawRecord>> {
        let source = self.source();
        let started = Instant::now();
        let rows = match self.fetch().await {
            Ok(rows) => rows,
            Err(e) => {
                SourcesMetrics::record_fetch_error(source);
                warn!("Fetch from {} failed: {}", source, e);
                return Err(match e {
                    e @ ReconError::SourceUnavailable { .. } => e,
                    other => ReconError::source_unavailable(source, other.to_string()),
                });
            }
        };
        if rows.is_empty() {
            SourcesMetrics::record_fetch_error(source);
            return Err(ReconError::source_unavailable(source, "payload contained no rows"));
        }
        SourcesMetrics::record_fetch_success(source, started.elapsed().as_secs_f64(), rows.len());

        let records: Vec<RawRecord> = rows.iter().map(|row| self.normalize(row)).collect();
        let issues: usize = records.iter().map(|r| r.issues.len()).sum();
        if issues > 0 {
            SourcesMetrics::record_parse_issues(source, issues);
        }
        info!(rows = records.len(), issues, "Collected records from {}", source);
        Ok(records)
    }
}

/// Rows of a JSON array payload
pub(crate) fn json_rows(source: SourceId, text: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(rows) => Ok(rows),
        _ => Err(ReconError::source_unavailable(source, "payload is not a JSON array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_source_parse() {
        assert_eq!(
            PayloadSource::parse("https://api.spacexdata.com/v4/launches"),
            PayloadSource::Url("https://api.spacexdata.com/v4/launches".into())
        );
        assert_eq!(
            PayloadSource::parse(" data/launches.json "),
            PayloadSource::File(PathBuf::from("data/launches.json"))
        );
    }

    #[test]
    fn test_json_rows_requires_array() {
        assert_eq!(json_rows(SourceId::Api, "[{}, {}]").unwrap().len(), 2);
        assert!(matches!(
            json_rows(SourceId::Api, "{\"docs\": []}"),
            Err(ReconError::SourceUnavailable { .. })
        ));
        assert!(json_rows(SourceId::Api, "not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let adapter = SpacexApiAdapter::new(
            PayloadSource::File(PathBuf::from("/nonexistent/launches.json")),
            &crate::config::ApiSourceConfig::default(),
        )
        .unwrap();
        match adapter.collect().await {
            Err(ReconError::SourceUnavailable { source_id, .. }) => assert_eq!(source_id, SourceId::Api),
            other => panic!("expected SourceUnavailable, got {other:?}"),
        }
    }
}
