//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dualconn_dial_attempts_total` (counter): dial attempts by target
//! - `dualconn_dial_failures_total` (counter): failed dial attempts by target
//! - `dualconn_unavailable_total` (counter): dials that found no usable target
//! - `dualconn_failback_total` (counter): secondary connections closed by failback, by trigger (dial, probe)
//! - `dualconn_connections_recycled_total` (counter): connections reaped by target
//! - `dualconn_target_connections` (gauge): live connection map size by target
//! - `dualconn_primary_healthy` (gauge): 1 if the last probe reached the primary
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels carry the target address, never connection IDs

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dial_attempt(target: &str) {
    metrics::counter!("dualconn_dial_attempts_total", "target" => target.to_string()).increment(1);
}

pub fn record_dial_failure(target: &str) {
    metrics::counter!("dualconn_dial_failures_total", "target" => target.to_string()).increment(1);
}

pub fn record_unavailable() {
    metrics::counter!("dualconn_unavailable_total").increment(1);
}

pub fn record_failback(trigger: &'static str, closed: usize) {
    metrics::counter!("dualconn_failback_total", "trigger" => trigger).increment(closed as u64);
}

pub fn record_recycled(target: &str, count: usize) {
    if count > 0 {
        metrics::counter!("dualconn_connections_recycled_total", "target" => target.to_string())
            .increment(count as u64);
    }
}

pub fn record_target_connections(target: &str, count: usize) {
    metrics::gauge!("dualconn_target_connections", "target" => target.to_string()).set(count as f64);
}

pub fn record_primary_health(healthy: bool) {
    metrics::gauge!("dualconn_primary_healthy").set(if healthy { 1.0 } else { 0.0 });
}
