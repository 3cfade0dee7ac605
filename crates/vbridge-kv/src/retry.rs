//! Retry policy for KV requests.
//!
//! Delays grow exponentially with full jitter, honor Retry-After on 429,
//! and stay below a configurable cap.

use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::{KvError, KvResult};
use crate::metrics::record_retry;

// =============================================================================
// Configuration
// =============================================================================

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Read tuning overrides from the environment.
    pub fn from_env() -> Self {
        let base_delay_ms: u64 = std::env::var("KV_RETRY_BASE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let max_delay_ms: u64 = std::env::var("KV_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);

        Self {
            max_retries: 3,
            base_delay_ms,
            max_delay_ms,
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Run an operation under the retry policy.
///
/// Network errors, 429 (honoring Retry-After), and 5xx responses are
/// retried; everything else returns immediately.
///
/// Does NOT retry:
/// - HTTP 4xx (except 429)
/// - Auth errors
/// - Not found
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> KvResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = KvResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let span = info_span!("kv_retry", operation = %operation, attempt = attempt + 1);

        let result = op().instrument(span).await;

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt, e.retry_after_ms());

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "KV operation failed, retrying: {}",
                    e
                );

                record_retry(operation);

                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| KvError::request_failed("Unknown error")))
}

/// Delay before the next attempt, with full jitter over an exponential curve.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    // Honor a server-requested delay if present
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after);
    }

    let exp_delay = config.base_delay_ms.saturating_mul(2u64.pow(attempt));
    let capped_delay = exp_delay.min(config.max_delay_ms);

    // Full jitter: random value between 0 and capped_delay, using time-based
    // pseudo-randomization to avoid pulling in a rand crate
    let jittered = if capped_delay > 0 {
        use std::time::SystemTime;
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let random_factor = (nanos % 1000) as f64 / 1000.0;
        ((capped_delay as f64) * random_factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 5000);
    }

    #[test]
    fn test_calculate_delay_with_retry_after() {
        let config = RetryConfig::default();
        let delay = calculate_delay(&config, 0, Some(2000));
        assert_eq!(delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_calculate_delay_respects_max() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 2000,
        };
        // Large attempt numbers must stay at the cap
        let delay = calculate_delay(&config, 10, None);
        assert!(delay.as_millis() <= 2000);
    }

    #[test]
    fn test_calculate_delay_minimum() {
        let config = RetryConfig::default();
        let delay = calculate_delay(&config, 0, None);
        assert!(delay.as_millis() >= config.base_delay_ms as u128);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_on_non_retryable() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let calls = std::cell::Cell::new(0u32);
        let result: KvResult<()> = with_retry(&config, "test_op", || {
            calls.set(calls.get() + 1);
            async { Err(KvError::auth_error("denied")) }
        })
        .await;

        assert!(matches!(result, Err(KvError::AuthError(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_with_retry_retries_server_errors() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let calls = std::cell::Cell::new(0u32);
        let result: KvResult<u32> = with_retry(&config, "test_op", || {
            let attempt = calls.get();
            calls.set(attempt + 1);
            async move {
                if attempt < 1 {
                    Err(KvError::ServerError(503, "unavailable".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.get(), 2);
    }
}
