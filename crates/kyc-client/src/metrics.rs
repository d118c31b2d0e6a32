//! Client metrics.
//!
//! Recorded through the `metrics` facade; the embedding application decides
//! whether an exporter is installed.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total API requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "kyc_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "kyc_request_latency_seconds";

    /// Session refresh exchanges by outcome.
    pub const REFRESH_TOTAL: &str = "kyc_refresh_total";

    /// Job status polls by reported status.
    pub const POLL_TICKS_TOTAL: &str = "kyc_poll_ticks_total";
}

/// Record metrics for a completed API request.
///
/// `status` is 0 when the request never got a response.
pub fn record_request(operation: &'static str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation,
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_ms / 1000.0);
}

/// Record the outcome of a bootstrap refresh (`success`, `retry`, `failure`).
pub fn record_refresh(outcome: &'static str) {
    counter!(names::REFRESH_TOTAL, "outcome" => outcome).increment(1);
}

/// Record one poll tick.
pub fn record_poll_tick(status: &'static str) {
    counter!(names::POLL_TICKS_TOTAL, "status" => status).increment(1);
}
