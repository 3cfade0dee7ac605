//! Startup validation and wiring of the relay collaborators.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vbridge_kv::{KvClient, KvConfig, KvResult};
use vbridge_models::IngestRecord;
use vbridge_storage::{R2Client, R2Config, StorageResult};
use vbridge_stream::{CopyRequest, StreamClient, StreamConfig, StreamResult, StreamVideo};

use crate::error::{WorkerError, WorkerResult};
use crate::processor::{BatchProcessor, IngestApi, RecordStore, UrlSigner};

/// Environment keys the relay cannot run without. `REDIS_URL` is consumed by
/// the queue client rather than these settings, but a deployment without it
/// would silently point at localhost, so it is gated here too.
const REQUIRED_KEYS: &[&str] = &[
    "R2_ACCESS_KEY_ID",
    "R2_SECRET_ACCESS_KEY",
    "R2_SOURCE_BUCKET",
    "CLOUDFLARE_ACCOUNT_ID",
    "CLOUDFLARE_API_TOKEN",
    "KV_NAMESPACE_ID",
    "REDIS_URL",
];

/// Validated configuration for everything the relay talks to.
///
/// Validation is all-or-nothing and runs before the worker joins the
/// consumer group: a partially configured deployment exits without touching
/// a single message, so the whole backlog stays queued for redelivery.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub r2: R2Config,
    pub stream: StreamConfig,
    pub kv: KvConfig,
}

impl RelaySettings {
    /// Load settings from the environment, reporting every missing key at
    /// once rather than failing on the first. Empty values count as missing.
    pub fn from_env() -> WorkerResult<Self> {
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| match std::env::var(key) {
                Ok(value) => value.is_empty(),
                Err(_) => true,
            })
            .collect();

        if !missing.is_empty() {
            return Err(WorkerError::config_error(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            r2: R2Config::from_env()?,
            stream: StreamConfig::from_env()?,
            kv: KvConfig::from_env()?,
        })
    }
}

/// Concrete collaborators shared by the processor and the HTTP surface.
#[derive(Clone)]
pub struct RelayContext {
    pub bucket: String,
    pub storage: Arc<R2Client>,
    pub stream: Arc<StreamClient>,
    pub kv: Arc<KvClient>,
}

impl RelayContext {
    /// Build the clients from validated settings.
    pub async fn new(settings: &RelaySettings) -> WorkerResult<Self> {
        Ok(Self {
            bucket: settings.r2.bucket_name.clone(),
            storage: Arc::new(R2Client::new(settings.r2.clone()).await?),
            stream: Arc::new(StreamClient::new(settings.stream.clone())?),
            kv: Arc::new(KvClient::new(settings.kv.clone())?),
        })
    }

    /// Assemble a batch processor over these collaborators.
    pub fn processor(&self) -> BatchProcessor {
        BatchProcessor::new(
            self.bucket.clone(),
            Arc::clone(&self.storage) as Arc<dyn UrlSigner>,
            Arc::clone(&self.stream) as Arc<dyn IngestApi>,
            Arc::clone(&self.kv) as Arc<dyn RecordStore>,
        )
    }
}

#[async_trait]
impl UrlSigner for R2Client {
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        R2Client::presign_get(self, key, expires_in).await
    }
}

#[async_trait]
impl IngestApi for StreamClient {
    async fn copy(&self, request: &CopyRequest) -> StreamResult<StreamVideo> {
        StreamClient::copy(self, request).await
    }
}

#[async_trait]
impl RecordStore for KvClient {
    async fn put_record(&self, key: &str, record: &IngestRecord) -> KvResult<()> {
        self.put_json(key, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in REQUIRED_KEYS {
            std::env::remove_var(key);
        }
        std::env::remove_var("R2_ENDPOINT_URL");
    }

    fn set_all() {
        std::env::set_var("R2_ACCESS_KEY_ID", "ak");
        std::env::set_var("R2_SECRET_ACCESS_KEY", "sk");
        std::env::set_var("R2_SOURCE_BUCKET", "uploads");
        std::env::set_var("CLOUDFLARE_ACCOUNT_ID", "acct1");
        std::env::set_var("CLOUDFLARE_API_TOKEN", "token1");
        std::env::set_var("KV_NAMESPACE_ID", "ns1");
        std::env::set_var("REDIS_URL", "redis://localhost:6379");
    }

    #[test]
    #[serial]
    fn test_settings_report_every_missing_key() {
        clear_env();
        std::env::set_var("R2_ACCESS_KEY_ID", "ak");

        let err = RelaySettings::from_env().unwrap_err();
        let msg = err.to_string();

        for key in [
            "R2_SECRET_ACCESS_KEY",
            "R2_SOURCE_BUCKET",
            "CLOUDFLARE_ACCOUNT_ID",
            "CLOUDFLARE_API_TOKEN",
            "KV_NAMESPACE_ID",
            "REDIS_URL",
        ] {
            assert!(msg.contains(key), "error should name {}: {}", key, msg);
        }
        assert!(!msg.contains("R2_ACCESS_KEY_ID"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_values_count_as_missing() {
        clear_env();
        set_all();
        std::env::set_var("CLOUDFLARE_API_TOKEN", "");

        let err = RelaySettings::from_env().unwrap_err();
        assert!(err.to_string().contains("CLOUDFLARE_API_TOKEN"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_settings_load_when_complete() {
        clear_env();
        set_all();

        let settings = RelaySettings::from_env().unwrap();

        assert_eq!(settings.r2.bucket_name, "uploads");
        assert_eq!(
            settings.r2.endpoint_url,
            "https://acct1.r2.cloudflarestorage.com"
        );
        assert_eq!(settings.stream.account_id, "acct1");
        assert_eq!(settings.kv.namespace_id, "ns1");
        clear_env();
    }
}
