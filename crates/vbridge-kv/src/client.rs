//! Workers KV REST API client.
//!
//! Built for unattended operation:
//! - Tuned HTTP client (connection pooling, timeouts)
//! - Exponential backoff with jitter
//! - Tracing spans and request metrics

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, Instrument};

use crate::error::{KvError, KvResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};

/// Default Cloudflare API base.
const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

// =============================================================================
// Configuration
// =============================================================================

/// KV client configuration.
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// API base URL (overridable for tests)
    pub api_base: String,
    /// Account the namespace belongs to
    pub account_id: String,
    /// API token with KV write access
    pub api_token: String,
    /// Namespace the records are written to
    pub namespace_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl KvConfig {
    pub fn new(
        account_id: impl Into<String>,
        api_token: impl Into<String>,
        namespace_id: impl Into<String>,
    ) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            account_id: account_id.into(),
            api_token: api_token.into(),
            namespace_id: namespace_id.into(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Load configuration from the environment.
    pub fn from_env() -> KvResult<Self> {
        let connect_timeout_secs: u64 = std::env::var("KV_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            api_base: std::env::var("KV_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            account_id: std::env::var("CLOUDFLARE_ACCOUNT_ID")
                .map_err(|_| KvError::auth_error("CLOUDFLARE_ACCOUNT_ID not set"))?,
            api_token: std::env::var("CLOUDFLARE_API_TOKEN")
                .map_err(|_| KvError::auth_error("CLOUDFLARE_API_TOKEN not set"))?,
            namespace_id: std::env::var("KV_NAMESPACE_ID")
                .map_err(|_| KvError::auth_error("KV_NAMESPACE_ID not set"))?,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Workers KV REST API client.
#[derive(Clone)]
pub struct KvClient {
    http: Client,
    config: KvConfig,
    base_url: String,
}

impl KvClient {
    /// Create a new KV client.
    pub fn new(config: KvConfig) -> KvResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vbridge-kv/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(KvError::Network)?;

        let base_url = format!(
            "{}/accounts/{}/storage/kv/namespaces/{}",
            config.api_base, config.account_id, config.namespace_id
        );

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> KvResult<Self> {
        Self::new(KvConfig::from_env()?)
    }

    /// Build the value URL for a key.
    fn value_url(&self, key: &str) -> String {
        format!("{}/values/{}", self.base_url, urlencoding::encode(key))
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Write raw bytes under `key`. Writes are last-write-wins per key.
    pub async fn put_value(&self, key: &str, value: Vec<u8>) -> KvResult<()> {
        let url = self.value_url(key);
        debug!("Writing {} bytes to KV key {}", value.len(), key);

        self.execute("put_value", key, || {
            let url = url.clone();
            let value = value.clone();
            async move {
                let response = self
                    .http
                    .put(&url)
                    .bearer_auth(&self.config.api_token)
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(value)
                    .send()
                    .await
                    .map_err(KvError::Network)?;

                if !response.status().is_success() {
                    return Err(Self::error_from_response(response).await);
                }

                let write: WriteResponse = response.json().await?;
                if !write.success {
                    return Err(match write.errors.first() {
                        Some(e) => {
                            KvError::request_failed(format!("KV error {}: {}", e.code, e.message))
                        }
                        None => KvError::request_failed("KV write reported failure"),
                    });
                }
                Ok(())
            }
        })
        .await
    }

    /// Serialize `value` as JSON and write it under `key`.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> KvResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_value(key, bytes).await
    }

    /// Read the raw bytes stored under `key`, or `None` if the key does not
    /// exist.
    pub async fn get_value(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let url = self.value_url(key);

        self.execute("get_value", key, || {
            let url = url.clone();
            async move {
                let response = self
                    .http
                    .get(&url)
                    .bearer_auth(&self.config.api_token)
                    .send()
                    .await
                    .map_err(KvError::Network)?;

                match response.status() {
                    StatusCode::OK => {
                        let bytes = response.bytes().await.map_err(KvError::Network)?;
                        Ok(Some(bytes.to_vec()))
                    }
                    StatusCode::NOT_FOUND => Ok(None),
                    _ => Err(Self::error_from_response(response).await),
                }
            }
        })
        .await
    }

    /// Read and deserialize the JSON value stored under `key`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> KvResult<Option<T>> {
        match self.get_value(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Wrap an operation with retry, a tracing span, and request metrics.
    async fn execute<T, F, Fut>(&self, operation: &'static str, key: &str, op: F) -> KvResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = KvResult<T>>,
    {
        let span = info_span!("kv_request", operation = %operation, key = %key);

        let start = Instant::now();
        let result = with_retry(&self.config.retry, operation, op)
            .instrument(span)
            .await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn error_from_response(response: reqwest::Response) -> KvError {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return KvError::RateLimited(retry_after_ms);
        }

        let body = response.text().await.unwrap_or_default();
        KvError::from_http_status(status.as_u16(), body)
    }
}

/// Envelope the KV write endpoint responds with.
#[derive(Debug, Deserialize)]
struct WriteResponse {
    success: bool,
    #[serde(default)]
    errors: Vec<WriteError>,
}

#[derive(Debug, Deserialize)]
struct WriteError {
    code: i64,
    message: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use vbridge_models::IngestRecord;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> KvClient {
        let mut config = KvConfig::new("acct1", "token1", "ns1");
        config.api_base = server.uri();
        config.retry = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        KvClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_put_json_encodes_key_in_path() {
        let server = MockServer::start().await;
        let record = IngestRecord::new("abc123", None);

        Mock::given(method("PUT"))
            .and(path(
                "/accounts/acct1/storage/kv/namespaces/ns1/values/videos%2Fdemo.mp4",
            ))
            .and(header("authorization", "Bearer token1"))
            .and(body_json(json!({"uid": "abc123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "messages": [], "result": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client.put_json("videos/demo.mp4", &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_json_returns_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/accounts/acct1/storage/kv/namespaces/ns1/values/videos%2Fdemo.mp4",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"uid":"abc123","playback":{"hls":"https://e/h.m3u8"}}"#),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let record: Option<IngestRecord> = client.get_json("videos/demo.mp4").await.unwrap();
        let record = record.unwrap();

        assert_eq!(record.uid, "abc123");
        assert_eq!(
            record.playback.unwrap().hls.as_deref(),
            Some("https://e/h.m3u8")
        );
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("key not found"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let value = client.get_value("absent").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_put_reports_envelope_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{"code": 10013, "message": "namespace not found"}],
                "messages": [],
                "result": null
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.put_value("k", b"{}".to_vec()).await.unwrap_err();

        match err {
            KvError::RequestFailed(msg) => assert!(msg.contains("10013")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_put_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "errors": [], "messages": [], "result": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client.put_value("k", b"{}".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_does_not_retry_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.put_value("k", b"{}".to_vec()).await.unwrap_err();
        assert!(matches!(err, KvError::AuthError(_)));
    }

    #[test]
    fn test_config_defaults() {
        let config = KvConfig::new("acct1", "token1", "ns1");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    fn clear_env() {
        for key in [
            "KV_API_BASE",
            "KV_CONNECT_TIMEOUT_SECS",
            "CLOUDFLARE_ACCOUNT_ID",
            "CLOUDFLARE_API_TOKEN",
            "KV_NAMESPACE_ID",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        std::env::set_var("CLOUDFLARE_ACCOUNT_ID", "acct1");
        std::env::set_var("CLOUDFLARE_API_TOKEN", "token1");
        std::env::set_var("KV_NAMESPACE_ID", "ns1");
        std::env::set_var("KV_CONNECT_TIMEOUT_SECS", "2");

        let config = KvConfig::from_env().unwrap();
        assert_eq!(config.account_id, "acct1");
        assert_eq!(config.namespace_id, "ns1");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_from_env_missing_token() {
        clear_env();
        std::env::set_var("CLOUDFLARE_ACCOUNT_ID", "acct1");

        let err = KvConfig::from_env().unwrap_err();
        assert!(matches!(err, KvError::AuthError(_)));
        clear_env();
    }
}
