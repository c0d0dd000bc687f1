use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{seal, DatasetSnapshot, DatasetStore, PendingDataset, VersionInfo, VersionSelector};
use crate::constants::LATEST_VERSION;
use crate::error::{ReconError, Result};
use crate::metrics::StoreMetrics;

/// In-memory dataset store for tests and single-process runs
#[derive(Default)]
pub struct InMemoryDatasetStore {
    /// Commit order; the last entry is latest
    versions: RwLock<Vec<Arc<DatasetSnapshot>>>,
}

impl InMemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasetStore for InMemoryDatasetStore {
    async fn commit(&self, tag: &str, dataset: PendingDataset) -> Result<VersionInfo> {
        let mut versions = self.versions.write().await;
        if versions.iter().any(|v| v.info.tag == tag) {
            StoreMetrics::record_commit_rejected();
            return Err(ReconError::VersionExists(tag.to_string()));
        }
        let snapshot = match seal(tag, versions.len() as u64 + 1, dataset) {
            Ok(s) => s,
            Err(e) => {
                StoreMetrics::record_commit_rejected();
                return Err(e);
            }
        };
        let info = snapshot.info.clone();
        versions.push(Arc::new(snapshot));
        StoreMetrics::record_commit_success(info.record_count);
        info!(tag = %info.tag, records = info.record_count, "Committed dataset version");
        Ok(info)
    }

    async fn read(&self, selector: &VersionSelector) -> Result<Arc<DatasetSnapshot>> {
        let versions = self.versions.read().await;
        let found = match selector {
            VersionSelector::Latest => versions.last(),
            VersionSelector::Tag(tag) => versions.iter().find(|v| &v.info.tag == tag),
        };
        debug!(selector = %selector, found = found.is_some(), "Read dataset version");
        found.cloned().ok_or_else(|| {
            ReconError::VersionNotFound(match selector {
                VersionSelector::Latest => LATEST_VERSION.to_string(),
                VersionSelector::Tag(tag) => tag.clone(),
            })
        })
    }

    async fn versions(&self) -> Result<Vec<VersionInfo>> {
        Ok(self.versions.read().await.iter().map(|v| v.info.clone()).collect())
    }
}
