//! Dataset store metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_commit_success(records: usize) {
        ::metrics::counter!(phase_metric!(counter, "store", "commits")).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "store", "latest_record_count")).set(records as f64);
    }

    pub fn record_commit_rejected() {
        ::metrics::counter!(phase_metric!(counter, "store", "commits_rejected")).increment(1);
    }
}

impl PhaseMetrics for StoreMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "store", "commits"));
        let _ = ::metrics::counter!(phase_metric!(counter, "store", "commits_rejected"));
        let _ = ::metrics::gauge!(phase_metric!(gauge, "store", "latest_record_count"));
    }

    fn phase_name() -> &'static str {
        "store"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "store", "commits"),
                metric_type: MetricType::Counter,
                help: "Dataset versions committed",
            },
            MetricDoc {
                name: phase_metric!(counter, "store", "commits_rejected"),
                metric_type: MetricType::Counter,
                help: "Commits rejected before any visible change",
            },
            MetricDoc {
                name: phase_metric!(gauge, "store", "latest_record_count"),
                metric_type: MetricType::Gauge,
                help: "Canonical records in the most recently committed version",
            },
        ]
    }
}
