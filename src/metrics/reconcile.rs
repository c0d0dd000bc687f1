//! Reconciliation metrics

use crate::domain::MatchConfidence;
use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ReconcileMetrics;

impl ReconcileMetrics {
    pub fn record_batch_input(records: usize) {
        ::metrics::counter!(phase_metric!(counter, "reconcile", "raw_records")).increment(records as u64);
    }

    pub fn record_canonical(confidence: MatchConfidence) {
        ::metrics::counter!(phase_metric!(counter, "reconcile", "canonical_records"), "confidence" => confidence.as_str())
            .increment(1);
    }

    pub fn record_conflicts(conflicts: usize) {
        ::metrics::counter!(phase_metric!(counter, "reconcile", "conflicts")).increment(conflicts as u64);
    }
}

impl PhaseMetrics for ReconcileMetrics {
    fn register_metrics() {
        let _ = ::metrics::counter!(phase_metric!(counter, "reconcile", "raw_records"));
        let _ = ::metrics::counter!(phase_metric!(counter, "reconcile", "conflicts"));
        for confidence in [MatchConfidence::Exact, MatchConfidence::Fuzzy, MatchConfidence::Unmatched] {
            let _ = ::metrics::counter!(phase_metric!(counter, "reconcile", "canonical_records"), "confidence" => confidence.as_str());
        }
    }

    fn phase_name() -> &'static str {
        "reconcile"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "raw_records"),
                metric_type: MetricType::Counter,
                help: "Raw records entering reconciliation",
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "canonical_records"),
                metric_type: MetricType::Counter,
                help: "Canonical records emitted, by match confidence",
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "conflicts"),
                metric_type: MetricType::Counter,
                help: "Attributes resolved by priority over a disagreeing value",
            },
        ]
    }
}
