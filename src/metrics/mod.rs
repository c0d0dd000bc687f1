//! Phase-organized metrics.
//!
//! Each pipeline phase owns a submodule with a zero-sized metrics type. Names follow
//! `lr_{phase}_{name}` and are registered up front so they show on the exporter
//! before first use. Recording without an installed recorder is a no-op.

pub mod features;
pub mod reconcile;
pub mod registry;
pub mod sources;
pub mod store;

pub use features::FeatureMetrics;
pub use reconcile::ReconcileMetrics;
pub use sources::SourcesMetrics;
pub use store::StoreMetrics;

use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once. The HTTP listener is started only when an
/// address is given; otherwise metrics are still collected for `render`.
/// Must be called from within a tokio runtime when an address is given.
pub fn init_metrics(listen_addr: Option<&str>) {
    if HANDLE.get().is_some() {
        return;
    }
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let addr = listen_addr.and_then(|a| match a.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("Invalid metrics address '{}': {}, exporter disabled", a, e);
            None
        }
    });

    let handle = match addr {
        Some(addr) => match builder.with_http_listener(addr).build() {
            Ok((recorder, exporter)) => {
                let handle = recorder.handle();
                if ::metrics::set_global_recorder(recorder).is_err() {
                    warn!("Failed to install Prometheus recorder: a recorder is already set");
                    return;
                }
                tokio::spawn(async move {
                    if exporter.await.is_err() {
                        warn!("Prometheus exporter stopped");
                    }
                });
                info!("Prometheus HTTP exporter listening at http://{}/metrics", addr);
                handle
            }
            Err(e) => {
                warn!("Failed to build Prometheus exporter: {}", e);
                return;
            }
        },
        None => match builder.install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                return;
            }
        },
    };
    let _ = HANDLE.set(handle);
    registry::register_all_metrics();
}

/// Current metrics in Prometheus text format, if a recorder is installed
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Touch every metric of the phase so it is exported with a zero value
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// lr_{phase}_{name}_total for counters, lr_{phase}_{name} otherwise
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("lr_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("lr_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("lr_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    #[test]
    fn test_metric_naming_convention() {
        assert_eq!(phase_metric!(counter, "store", "commits"), "lr_store_commits_total");
        assert_eq!(phase_metric!(histogram, "sources", "fetch_seconds"), "lr_sources_fetch_seconds");
    }
}
