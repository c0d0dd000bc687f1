//! Source adapter metrics: fetch outcomes, latency, and rows per payload

use crate::domain::SourceId;
use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct SourcesMetrics;

impl SourcesMetrics {
    pub fn record_fetch_success(source: SourceId, duration_secs: f64, rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "sources", "fetch_success"), "source" => source.as_str())
            .increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "sources", "fetch_duration_seconds"), "source" => source.as_str())
            .record(duration_secs);
        ::metrics::histogram!(phase_metric!(histogram, "sources", "payload_rows"), "source" => source.as_str())
            .record(rows as f64);
    }

    pub fn record_fetch_error(source: SourceId) {
        ::metrics::counter!(phase_metric!(counter, "sources", "fetch_error"), "source" => source.as_str())
            .increment(1);
    }

    pub fn record_parse_issues(source: SourceId, issues: usize) {
        ::metrics::counter!(phase_metric!(counter, "sources", "parse_issues"), "source" => source.as_str())
            .increment(issues as u64);
    }
}

impl PhaseMetrics for SourcesMetrics {
    fn register_metrics() {
        for source in [SourceId::Api, SourceId::Scrape] {
            let _ = ::metrics::counter!(phase_metric!(counter, "sources", "fetch_success"), "source" => source.as_str());
            let _ = ::metrics::counter!(phase_metric!(counter, "sources", "fetch_error"), "source" => source.as_str());
            let _ = ::metrics::counter!(phase_metric!(counter, "sources", "parse_issues"), "source" => source.as_str());
        }
    }

    fn phase_name() -> &'static str {
        "sources"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "sources", "fetch_success"),
                metric_type: MetricType::Counter,
                help: "Successful source payload fetches",
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "fetch_error"),
                metric_type: MetricType::Counter,
                help: "Failed or empty source payload fetches",
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "parse_issues"),
                metric_type: MetricType::Counter,
                help: "Fields nulled because a source value could not be parsed",
            },
            MetricDoc {
                name: phase_metric!(histogram, "sources", "fetch_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Source fetch latency in seconds",
            },
            MetricDoc {
                name: phase_metric!(histogram, "sources", "payload_rows"),
                metric_type: MetricType::Histogram,
                help: "Rows per fetched source payload",
            },
        ]
    }
}
