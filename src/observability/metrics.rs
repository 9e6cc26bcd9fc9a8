//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define runtime metrics (request counts, latency, active requests)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `runtime_requests_total` (counter): completed requests by method, status
//! - `runtime_request_duration_seconds` (histogram): latency distribution
//! - `runtime_active_requests` (gauge): requests currently in flight
//! - `runtime_rate_limited_total` (counter): admission denials
//! - `runtime_timeouts_total` (counter): deadline expirations
//!
//! # Design Decisions
//! - Low-overhead updates (atomic recorder operations)
//! - Exporter failures are logged, never fatal

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "runtime_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("runtime_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Update the in-flight request gauge.
pub fn record_active(active: u64) {
    gauge!("runtime_active_requests").set(active as f64);
}

/// Count an admission denial from the rate limiter.
pub fn record_rate_limited() {
    counter!("runtime_rate_limited_total").increment(1);
}

/// Count a per-request deadline expiration.
pub fn record_timeout() {
    counter!("runtime_timeouts_total").increment(1);
}
