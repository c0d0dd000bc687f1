//! Feature derivation metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct FeatureMetrics;

impl FeatureMetrics {
    pub fn record_derived(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "features", "rows")).increment(rows as u64);
    }

    pub fn record_lookup_miss() {
        ::metrics::counter!(phase_metric!(counter, "features", "proximity_misses")).increment(1);
    }

    pub fn record_unlocated_pad() {
        ::metrics::counter!(phase_metric!(counter, "features", "unlocated_pads")).increment(1);
    }
}

impl PhaseMetrics for FeatureMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "features", "rows"));
        let _ = ::metrics::counter!(phase_metric!(counter, "features", "proximity_misses"));
        let _ = ::metrics::counter!(phase_metric!(counter, "features", "unlocated_pads"));
    }

    fn phase_name() -> &'static str {
        "features"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "features", "rows"),
                metric_type: MetricType::Counter,
                help: "Feature rows derived",
            },
            MetricDoc {
                name: phase_metric!(counter, "features", "proximity_misses"),
                metric_type: MetricType::Counter,
                help: "Rows whose hazard distance is null after a proximity lookup miss",
            },
            MetricDoc {
                name: phase_metric!(counter, "features", "unlocated_pads"),
                metric_type: MetricType::Counter,
                help: "Rows whose pad had no resolvable coordinates",
            },
        ]
    }
}
