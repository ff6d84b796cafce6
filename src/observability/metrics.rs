//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingress_sync_reconcile_total` (counter): passes by resulting action
//! - `ingress_sync_reconcile_duration_seconds` (histogram): pass latency
//! - `ingress_sync_control_plane_calls_total` (counter): calls by operation, result
//! - `ingress_sync_backend_errors_total` (counter): failed backend passes
//! - `ingress_sync_slots` (gauge): slots per backend and state

use std::net::SocketAddr;
use std::time::Duration;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished reconciliation pass.
pub fn record_reconcile(action: &str, elapsed: Duration) {
    metrics::counter!("ingress_sync_reconcile_total", "action" => action.to_string()).increment(1);
    metrics::histogram!("ingress_sync_reconcile_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record one control-plane call.
pub fn record_control_plane_call(operation: &'static str, success: bool) {
    let result = if success { "ok" } else { "error" };
    metrics::counter!("ingress_sync_control_plane_calls_total", "operation" => operation, "result" => result).increment(1);
}

/// Record a backend whose pass finished with errors.
pub fn record_backend_error(backend: &str) {
    metrics::counter!("ingress_sync_backend_errors_total", "backend" => backend.to_string()).increment(1);
}

/// Record slot pool occupancy of a backend.
pub fn record_slot_pool(backend: &str, total: usize, active: usize, dirty: usize) {
    let backend = backend.to_string();
    metrics::gauge!("ingress_sync_slots", "backend" => backend.clone(), "state" => "total").set(total as f64);
    metrics::gauge!("ingress_sync_slots", "backend" => backend.clone(), "state" => "active").set(active as f64);
    metrics::gauge!("ingress_sync_slots", "backend" => backend, "state" => "dirty").set(dirty as f64);
}
