//! Registers every phase's metrics and reports name collisions between phases

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::sources::SourcesMetrics>(&mut all_metrics);
    register_phase_metrics::<super::reconcile::ReconcileMetrics>(&mut all_metrics);
    register_phase_metrics::<super::features::FeatureMetrics>(&mut all_metrics);
    register_phase_metrics::<super::store::StoreMetrics>(&mut all_metrics);

    info!("Registered {} metrics across all phases", all_metrics.len());
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<String, (&'static str, MetricDoc)>) {
    T::register_metrics();
    let phase_name = T::phase_name();
    for doc in T::metrics_documentation() {
        if phase_of(doc.name) != phase_name {
            warn!("Metric '{}' does not carry its phase prefix '{}'", doc.name, phase_name);
        }
        if let Some((existing_phase, _)) = all_metrics.get(doc.name) {
            warn!(
                "Metric name conflict: '{}' is defined by both '{}' and '{}'",
                doc.name, existing_phase, phase_name
            );
        } else {
            debug!("  - {} ({:?}): {}", doc.name, doc.metric_type, doc.help);
            all_metrics.insert(doc.name.to_string(), (phase_name, doc));
        }
    }
}

/// "lr_store_commits_total" -> "store"
fn phase_of(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("lr_")
        .and_then(|rest| rest.split('_').next())
        .unwrap_or("unknown")
}
