//! KV metrics collection.
//!
//! What gets recorded per KV call:
//! - Request counts labelled by operation and status
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Names of the metrics this crate emits.
pub mod names {
    /// Total KV requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "kv_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "kv_retries_total";

    /// Request latency in seconds, labelled by operation.
    pub const LATENCY_SECONDS: &str = "kv_latency_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed KV request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    let status_str = status.to_string();

    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status_str
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
