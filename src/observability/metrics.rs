//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guildroster_dependency_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `guildroster_signals_total` (counter): termination signals by name
//! - `guildroster_shutdown_total` (counter): shutdown ladder outcomes
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! metrics-disabled deployments pay nothing.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_dependency_health(healthy: bool) {
    metrics::gauge!("guildroster_dependency_healthy").set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_signal(signal: &'static str) {
    metrics::counter!("guildroster_signals_total", "signal" => signal).increment(1);
}

pub fn record_shutdown(outcome: &'static str) {
    metrics::counter!("guildroster_shutdown_total", "outcome" => outcome).increment(1);
}
