// Versioned dataset storage: every commit is an immutable, tagged snapshot

pub mod file;
pub mod in_memory;

pub use file::FileDatasetStore;
pub use in_memory::InMemoryDatasetStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::constants::{FEATURE_SCHEMA_VERSION, LATEST_VERSION};
use crate::domain::{CanonicalRecord, FeatureRecord};
use crate::error::{ReconError, Result};
use crate::pipeline::diagnostics::BatchDiagnostics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub tag: String,
    /// 1-based commit order within the store
    pub sequence: u64,
    pub committed_at: DateTime<Utc>,
    pub schema_version: u32,
    /// SHA-256 over the serialized canonical and feature sets
    pub content_checksum: String,
    pub record_count: usize,
}

/// One committed dataset version. Never mutated after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub info: VersionInfo,
    pub canonical: Vec<CanonicalRecord>,
    pub features: Vec<FeatureRecord>,
    pub diagnostics: BatchDiagnostics,
}

/// What a batch hands to the store
#[derive(Debug, Clone, Default)]
pub struct PendingDataset {
    pub canonical: Vec<CanonicalRecord>,
    pub features: Vec<FeatureRecord>,
    pub diagnostics: BatchDiagnostics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Tag(String),
}

impl VersionSelector {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case(LATEST_VERSION) {
            Self::Latest
        } else {
            Self::Tag(value.trim().to_string())
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "{LATEST_VERSION}"),
            Self::Tag(tag) => write!(f, "{tag}"),
        }
    }
}

/// Append-only store of dataset versions.
///
/// `commit` is all-or-nothing: a rejected or failed commit leaves every reader seeing
/// exactly what it saw before, including the latest pointer.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn commit(&self, tag: &str, dataset: PendingDataset) -> Result<VersionInfo>;
    async fn read(&self, selector: &VersionSelector) -> Result<Arc<DatasetSnapshot>>;
    /// Committed versions, oldest first
    async fn versions(&self) -> Result<Vec<VersionInfo>>;
}

/// Tags double as file names, so they are restricted to a safe alphabet
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(ReconError::InvalidVersion("tag must not be empty".into()));
    }
    if tag.eq_ignore_ascii_case(LATEST_VERSION) {
        return Err(ReconError::InvalidVersion(format!("'{tag}' is reserved")));
    }
    if tag.starts_with('.') || !tag.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
        return Err(ReconError::InvalidVersion(format!(
            "tag '{tag}' may only contain letters, digits, '.', '-' and '_'"
        )));
    }
    Ok(())
}

/// Check the dataset and stamp it with version metadata
pub fn seal(tag: &str, sequence: u64, dataset: PendingDataset) -> Result<DatasetSnapshot> {
    validate_tag(tag)?;

    let mut ids = HashSet::with_capacity(dataset.canonical.len());
    for record in &dataset.canonical {
        if !ids.insert(record.launch_id) {
            return Err(ReconError::InvalidVersion(format!(
                "duplicate launch_id {}",
                record.launch_id
            )));
        }
    }
    if dataset.features.len() != dataset.canonical.len() {
        return Err(ReconError::InvalidVersion(format!(
            "{} feature rows for {} canonical records",
            dataset.features.len(),
            dataset.canonical.len()
        )));
    }
    let mut feature_ids = HashSet::with_capacity(dataset.features.len());
    for row in &dataset.features {
        if !ids.contains(&row.launch_id) || !feature_ids.insert(row.launch_id) {
            return Err(ReconError::InvalidVersion(format!(
                "feature row {} has no unique canonical record",
                row.launch_id
            )));
        }
    }

    let content_checksum = content_checksum(&dataset.canonical, &dataset.features)?;
    Ok(DatasetSnapshot {
        info: VersionInfo {
            tag: tag.to_string(),
            sequence,
            committed_at: Utc::now(),
            schema_version: FEATURE_SCHEMA_VERSION,
            content_checksum,
            record_count: dataset.canonical.len(),
        },
        canonical: dataset.canonical,
        features: dataset.features,
        diagnostics: dataset.diagnostics,
    })
}

pub fn content_checksum(canonical: &[CanonicalRecord], features: &[FeatureRecord]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(canonical)?);
    hasher.update(serde_json::to_vec(features)?);
    Ok(hex::encode(hasher.finalize()))
}
