use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::apis::SourceAdapter;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::diagnostics::BatchDiagnostics;
use crate::pipeline::processing::{FeatureDeriver, ProximityIndex, ReconcileConfig, Reconciler, RecordReconciler};
use crate::pipeline::storage::{DatasetStore, PendingDataset, VersionInfo};

/// Outcome of one committed batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub version: VersionInfo,
    pub diagnostics: BatchDiagnostics,
}

/// Runs one batch end to end: collect, reconcile, derive, commit
pub struct Pipeline {
    reconciler: RecordReconciler,
}

impl Pipeline {
    pub fn new(reconciler: RecordReconciler) -> Self {
        Self { reconciler }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(RecordReconciler::new(ReconcileConfig::from_config(config)?)))
    }

    /// Both sources are collected concurrently. Any source failure aborts the batch
    /// before reconciliation and leaves the store untouched.
    #[instrument(skip_all, fields(tag = %tag))]
    pub async fn run_batch(
        &self,
        api: &dyn SourceAdapter,
        scrape: &dyn SourceAdapter,
        index: &ProximityIndex,
        store: &dyn DatasetStore,
        tag: &str,
    ) -> Result<BatchReport> {
        let started = Instant::now();
        info!("Starting batch");

        let (api_records, scrape_records) = tokio::join!(api.collect(), scrape.collect());
        let records = match (api_records, scrape_records) {
            (Ok(a), Ok(s)) => {
                let mut all = a;
                all.extend(s);
                all
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Batch aborted before reconciliation: {}", e);
                return Err(e);
            }
        };

        let reconciled = self.reconciler.reconcile(&records);
        let derived = FeatureDeriver::new(index).derive(&reconciled.records);

        let mut diagnostics = reconciled.diagnostics;
        diagnostics.merge(derived.diagnostics);
        diagnostics.log_summary();

        let version = store
            .commit(
                tag,
                PendingDataset {
                    canonical: reconciled.records,
                    features: derived.features,
                    diagnostics: diagnostics.clone(),
                },
            )
            .await?;

        info!(
            tag = %version.tag,
            records = version.record_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch committed"
        );
        Ok(BatchReport { version, diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LaunchTime, RawRecord, SourceId};
    use crate::error::ReconError;
    use crate::pipeline::storage::{InMemoryDatasetStore, VersionSelector};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    /// Adapter over fixed rows: each row is `{"name", "ts"}`
    struct FixedAdapter {
        source: SourceId,
        rows: Vec<Value>,
    }

    #[async_trait]
    impl SourceAdapter for FixedAdapter {
        fn source(&self) -> SourceId {
            self.source
        }

        async fn fetch(&self) -> Result<Vec<Value>> {
            Ok(self.rows.clone())
        }

        fn normalize(&self, row: &Value) -> RawRecord {
            let mut record = RawRecord::new(self.source, row["name"].as_str().unwrap_or_default());
            record.launch_time = row["ts"]
                .as_i64()
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                .map(LaunchTime::exact);
            record
        }
    }

    fn adapter(source: SourceId, rows: Vec<Value>) -> FixedAdapter {
        FixedAdapter { source, rows }
    }

    #[tokio::test]
    async fn test_batch_commits_reconciled_dataset() {
        let api = adapter(SourceId::Api, vec![json!({"name": "CRS-20", "ts": 1_583_556_600})]);
        let scrape = adapter(
            SourceId::Scrape,
            vec![
                json!({"name": "SpaceX CRS-20", "ts": 1_583_556_600}),
                json!({"name": "Starlink 5", "ts": 1_584_500_000}),
            ],
        );
        let store = InMemoryDatasetStore::new();
        let pipeline = Pipeline::new(RecordReconciler::default());

        let report = pipeline
            .run_batch(&api, &scrape, &ProximityIndex::default(), &store, "v1")
            .await
            .unwrap();

        assert_eq!(report.version.tag, "v1");
        assert_eq!(report.diagnostics.raw_records, 3);
        let snapshot = store.read(&VersionSelector::Latest).await.unwrap();
        assert_eq!(snapshot.features.len(), snapshot.canonical.len());
    }

    #[tokio::test]
    async fn test_empty_source_aborts_and_keeps_latest() {
        let store = InMemoryDatasetStore::new();
        let pipeline = Pipeline::new(RecordReconciler::default());
        let index = ProximityIndex::default();
        let api = adapter(SourceId::Api, vec![json!({"name": "CRS-20", "ts": 1_583_556_600})]);
        let scrape = adapter(SourceId::Scrape, vec![json!({"name": "CRS-20", "ts": 1_583_556_600})]);
        pipeline.run_batch(&api, &scrape, &index, &store, "v1").await.unwrap();

        let empty = adapter(SourceId::Scrape, Vec::new());
        let err = pipeline.run_batch(&api, &empty, &index, &store, "v2").await.unwrap_err();
        assert!(matches!(err, ReconError::SourceUnavailable { source_id: SourceId::Scrape, .. }));

        assert_eq!(store.read(&VersionSelector::Latest).await.unwrap().info.tag, "v1");
        assert_eq!(store.versions().await.unwrap().len(), 1);
    }
}
