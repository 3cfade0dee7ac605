//! Prometheus metrics for the relay worker.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// The returned handle renders the exposition text for the metrics route.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric name constants.
pub mod names {
    // Message metrics
    pub const MESSAGES_PROCESSED_TOTAL: &str = "vbridge_messages_processed_total";
    pub const MESSAGE_DURATION_SECONDS: &str = "vbridge_message_duration_seconds";

    // Batch metrics
    pub const BATCHES_CONSUMED_TOTAL: &str = "vbridge_batches_consumed_total";
    pub const BATCH_SIZE: &str = "vbridge_batch_size";

    // Queue depth
    pub const QUEUE_LENGTH: &str = "vbridge_queue_length";
    pub const DLQ_LENGTH: &str = "vbridge_dlq_length";
    pub const DLQ_MESSAGES_TOTAL: &str = "vbridge_dlq_messages_total";
}

/// Record one processed message, labelled by outcome.
pub fn record_message(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];

    counter!(names::MESSAGES_PROCESSED_TOTAL, &labels).increment(1);
    histogram!(names::MESSAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a consumed batch and its size.
pub fn record_batch(size: usize) {
    counter!(names::BATCHES_CONSUMED_TOTAL).increment(1);
    histogram!(names::BATCH_SIZE).record(size as f64);
}

/// Record a message moved to the dead letter queue.
pub fn record_dlq() {
    counter!(names::DLQ_MESSAGES_TOTAL).increment(1);
}

/// Update the queue depth gauges.
pub fn set_queue_depth(queue_len: u64, dlq_len: u64) {
    gauge!(names::QUEUE_LENGTH).set(queue_len as f64);
    gauge!(names::DLQ_LENGTH).set(dlq_len as f64);
}
