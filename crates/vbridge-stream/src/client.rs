//! Stream HTTP client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{StreamError, StreamResult};
use crate::types::{ApiEnvelope, CopyRequest, StreamVideo};

/// Default Cloudflare API base.
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Configuration for the Stream client.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// API base URL (overridable for tests)
    pub api_base: String,
    /// Account the created videos belong to
    pub account_id: String,
    /// API token with Stream write access
    pub api_token: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for transient failures
    pub max_retries: u32,
}

impl StreamConfig {
    pub fn new(account_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            account_id: account_id.into(),
            api_token: api_token.into(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }

    /// Build configuration from the environment.
    pub fn from_env() -> StreamResult<Self> {
        Ok(Self {
            api_base: std::env::var("STREAM_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            account_id: std::env::var("CLOUDFLARE_ACCOUNT_ID")
                .map_err(|_| StreamError::config_error("CLOUDFLARE_ACCOUNT_ID not set"))?,
            api_token: std::env::var("CLOUDFLARE_API_TOKEN")
                .map_err(|_| StreamError::config_error("CLOUDFLARE_API_TOKEN not set"))?,
            timeout: Duration::from_secs(
                std::env::var("STREAM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("STREAM_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        })
    }
}

/// Client for the Cloudflare Stream API.
pub struct StreamClient {
    http: Client,
    config: StreamConfig,
}

impl StreamClient {
    /// Create a new Stream client.
    pub fn new(config: StreamConfig) -> StreamResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vbridge-stream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StreamError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StreamResult<Self> {
        Self::new(StreamConfig::from_env()?)
    }

    /// Ask Stream to copy a video from a URL into the account.
    ///
    /// A success here means the envelope parsed and `success` was true; the
    /// returned video may still describe a rejected ingest (no `uid`), which
    /// callers must branch on themselves.
    pub async fn copy(&self, request: &CopyRequest) -> StreamResult<StreamVideo> {
        let url = format!(
            "{}/accounts/{}/stream/copy",
            self.config.api_base, self.config.account_id
        );

        debug!("Requesting Stream copy of {}", request.meta.name);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.config.api_token)
                    .json(request)
                    .send()
                    .await
                    .map_err(StreamError::Network)?;

                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_ms = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(|secs| secs * 1000)
                        .unwrap_or(1000);
                    return Err(StreamError::RateLimited(retry_after_ms));
                }

                let body = response.text().await.unwrap_or_default();
                Err(StreamError::from_http_status(status.as_u16(), body))
            })
            .await?;

        let body = response.text().await.map_err(StreamError::Network)?;
        let envelope: ApiEnvelope<StreamVideo> = serde_json::from_str(&body)?;

        if !envelope.success {
            return Err(StreamError::from_envelope(&envelope.errors));
        }

        envelope
            .result
            .ok_or_else(|| StreamError::invalid_response("success envelope carried no result"))
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> StreamResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StreamResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = match &e {
                        StreamError::RateLimited(ms) => Duration::from_millis(*ms),
                        _ => Duration::from_millis(500 * 2u64.pow(attempt)),
                    };
                    warn!(
                        "Stream request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(StreamError::RequestFailed("Unknown error".to_string())))
    }
}
