//! Worker configuration.

use std::time::Duration;

/// Tuning knobs for the batch executor and the HTTP surface.
///
/// Everything here has a sensible default; none of these gate startup the
/// way the relay credentials do.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of messages consumed per batch
    pub batch_size: usize,
    /// How long a consume call blocks waiting for messages
    pub consume_block: Duration,
    /// How often to scan for stalled pending messages
    pub claim_interval: Duration,
    /// Minimum idle time before a pending message is claimed
    pub claim_min_idle: Duration,
    /// HTTP bind host
    pub http_host: String,
    /// HTTP bind port
    pub http_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            consume_block: Duration::from_millis(1000),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            http_host: "0.0.0.0".to_string(),
            http_port: 8787,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            batch_size: std::env::var("WORKER_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_size),
            consume_block: std::env::var("WORKER_CONSUME_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.consume_block),
            claim_interval: std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_interval),
            claim_min_idle: std::env::var("WORKER_CLAIM_MIN_IDLE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_min_idle),
            http_host: std::env::var("HTTP_HOST").unwrap_or(defaults.http_host),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.http_port),
        }
    }
}
