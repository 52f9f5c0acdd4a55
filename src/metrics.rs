//! Prometheus metrics for the gateway.
//!
//! Metrics are exposed on a dedicated listener (`METRICS_PORT`, default 9090).
//! Recording functions are no-ops until [`init_metrics`] installs a recorder.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_requests_total` - Requests seen by the access logger (labels: method, status)
//! - `gateway_auth_decisions_total` - Authentication filter outcomes (label: decision)
//! - `gateway_upstream_errors_total` - Failed upstream dispatches (label: kind)
//!
//! ## Histograms
//! - `gateway_request_duration_seconds` - End-to-end request duration (labels: method, status)

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";
    pub const AUTH_DECISIONS_TOTAL: &str = "gateway_auth_decisions_total";
    pub const UPSTREAM_ERRORS_TOTAL: &str = "gateway_upstream_errors_total";
}

/// Install the Prometheus exporter and describe every gateway metric.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::REQUESTS_TOTAL,
        "Total number of requests handled by the gateway"
    );
    describe_counter!(
        names::AUTH_DECISIONS_TOTAL,
        "Authentication filter decisions (public, authenticated, or rejection reason)"
    );
    describe_counter!(
        names::UPSTREAM_ERRORS_TOTAL,
        "Total number of failed upstream dispatches"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "End-to-end request duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one finished request. `status` is the numeric code, or the
/// completion kind when no response was produced.
pub fn record_request(method: &str, status: &str, duration_secs: f64) {
    counter!(names::REQUESTS_TOTAL, "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, "method" => method.to_string(), "status" => status.to_string())
        .record(duration_secs);
}

/// Record an authentication filter decision.
pub fn record_auth_decision(decision: &str) {
    counter!(names::AUTH_DECISIONS_TOTAL, "decision" => decision.to_string()).increment(1);
}

/// Record a failed upstream dispatch.
pub fn record_upstream_error(kind: &str) {
    counter!(names::UPSTREAM_ERRORS_TOTAL, "kind" => kind.to_string()).increment(1);
}
