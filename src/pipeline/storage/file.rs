use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{seal, validate_tag, DatasetSnapshot, DatasetStore, PendingDataset, VersionInfo, VersionSelector};
use crate::constants::LATEST_VERSION;
use crate::error::{ReconError, Result};
use crate::metrics::StoreMetrics;

const MANIFEST: &str = "MANIFEST";
const VERSION_EXT: &str = "json";

/// One JSON file per version plus a `MANIFEST` listing the committed versions in order.
///
/// The manifest is the only thing readers trust. A version file becomes visible when the
/// manifest naming it is renamed into place, so a commit publishes through a single rename
/// and a failure at any earlier step leaves readers where they were.
pub struct FileDatasetStore {
    dir: PathBuf,
    /// Serializes commits within this process
    commit_lock: Mutex<()>,
}

impl FileDatasetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn version_path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{tag}.{VERSION_EXT}"))
    }

    /// Write to a sibling temp file, then rename over the target
    async fn replace(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = self.dir.join(format!(".{file_name}.tmp"));
        fs::write(&temp, bytes).await?;
        if let Err(e) = fs::rename(&temp, target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Committed versions in commit order; a store that was never written is empty
    async fn manifest(&self) -> Result<Vec<VersionInfo>> {
        match fs::read(self.dir.join(MANIFEST)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, tag: &str) -> Result<DatasetSnapshot> {
        let bytes = match fs::read(self.version_path(tag)).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReconError::VersionNotFound(tag.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl DatasetStore for FileDatasetStore {
    async fn commit(&self, tag: &str, dataset: PendingDataset) -> Result<VersionInfo> {
        let _guard = self.commit_lock.lock().await;
        let mut manifest = self.manifest().await?;
        if manifest.iter().any(|v| v.tag == tag) {
            StoreMetrics::record_commit_rejected();
            return Err(ReconError::VersionExists(tag.to_string()));
        }
        let sequence = manifest.iter().map(|v| v.sequence).max().unwrap_or(0) + 1;
        let snapshot = match seal(tag, sequence, dataset) {
            Ok(s) => s,
            Err(e) => {
                StoreMetrics::record_commit_rejected();
                return Err(e);
            }
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        fs::create_dir_all(&self.dir).await?;
        // not yet listed, so readers cannot see it; overwrites leftovers of an interrupted commit
        let path = self.version_path(tag);
        self.replace(&path, &bytes).await?;

        manifest.push(snapshot.info.clone());
        let published = match serde_json::to_vec_pretty(&manifest) {
            Ok(listing) => self.replace(&self.dir.join(MANIFEST), &listing).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = published {
            warn!("Failed to publish version '{}': {}", tag, e);
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }

        StoreMetrics::record_commit_success(snapshot.info.record_count);
        info!(
            tag = %snapshot.info.tag,
            records = snapshot.info.record_count,
            dir = %self.dir.display(),
            "Committed dataset version"
        );
        Ok(snapshot.info)
    }

    async fn read(&self, selector: &VersionSelector) -> Result<Arc<DatasetSnapshot>> {
        let manifest = self.manifest().await?;
        let info = match selector {
            VersionSelector::Latest => manifest
                .last()
                .ok_or_else(|| ReconError::VersionNotFound(LATEST_VERSION.to_string()))?,
            VersionSelector::Tag(tag) => {
                validate_tag(tag).map_err(|_| ReconError::VersionNotFound(tag.clone()))?;
                manifest
                    .iter()
                    .find(|v| &v.tag == tag)
                    .ok_or_else(|| ReconError::VersionNotFound(tag.clone()))?
            }
        };
        debug!(selector = %selector, tag = %info.tag, "Reading dataset version");
        Ok(Arc::new(self.load(&info.tag).await?))
    }

    async fn versions(&self) -> Result<Vec<VersionInfo>> {
        let mut infos = self.manifest().await?;
        infos.sort_by(|a, b| (a.sequence, &a.tag).cmp(&(b.sequence, &b.tag)));
        Ok(infos)
    }
}
