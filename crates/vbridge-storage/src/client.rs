//! R2 client implementation.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// How long presigned GET URLs stay valid. This is the window Stream has to
/// fetch the object after a copy request is accepted.
pub const PRESIGN_TTL: Duration = Duration::from_secs(900);

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket uploads land in
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl R2Config {
    /// Create config from environment variables.
    ///
    /// The endpoint may be set explicitly via `R2_ENDPOINT_URL`; otherwise it
    /// is derived from `CLOUDFLARE_ACCOUNT_ID` as
    /// `https://<account>.r2.cloudflarestorage.com`.
    pub fn from_env() -> StorageResult<Self> {
        let endpoint_url = match std::env::var("R2_ENDPOINT_URL") {
            Ok(url) => url,
            Err(_) => {
                let account = std::env::var("CLOUDFLARE_ACCOUNT_ID").map_err(|_| {
                    StorageError::config_error("R2_ENDPOINT_URL or CLOUDFLARE_ACCOUNT_ID not set")
                })?;
                format!("https://{}.r2.cloudflarestorage.com", account)
            }
        };

        Ok(Self {
            endpoint_url,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_SOURCE_BUCKET")
                .map_err(|_| StorageError::config_error("R2_SOURCE_BUCKET not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Cloudflare R2 storage client.
///
/// The relay never reads object bytes itself: it signs GET URLs that Stream
/// fetches, so the surface is presigning plus a connectivity probe.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
}

impl R2Client {
    /// Build an R2 client for the configured account endpoint.
    pub async fn new(config: R2Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = R2Config::from_env()?;
        Self::new(config).await
    }

    /// Bucket this client signs URLs for.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Presign a GET for `key`, valid for `expires_in`.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("object key is empty"));
        }

        debug!("Presigning GET for {}", key);

        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Verify the configured bucket is reachable.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}
