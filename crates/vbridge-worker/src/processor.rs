//! Batch processor: turns each queued notification into an ingest record.
//!
//! Each message is handled independently and classified into an [`Outcome`];
//! the executor then acks or retries based on the outcome's [`Disposition`].
//! Processing never fails the batch: an error on one message becomes a
//! retryable outcome for that message and the loop moves on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use vbridge_kv::KvResult;
use vbridge_models::{IngestRecord, UploadNotification};
use vbridge_queue::{Batch, QueueMessage};
use vbridge_storage::{StorageResult, PRESIGN_TTL};
use vbridge_stream::{CopyRequest, StreamResult, StreamVideo};

use crate::error::WorkerResult;
use crate::metrics::record_message;

// ============================================================================
// Capability traits
// ============================================================================

/// Signs time-limited GET URLs for objects in the source bucket.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;
}

/// Submits copy-from-URL requests to the video host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IngestApi: Send + Sync {
    async fn copy(&self, request: &CopyRequest) -> StreamResult<StreamVideo>;
}

/// Stores ingest records keyed by object key. Last write wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put_record(&self, key: &str, record: &IngestRecord) -> KvResult<()>;
}

// ============================================================================
// Outcomes
// ============================================================================

/// What the executor should do with a message after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message from the queue.
    Ack,
    /// Leave the message pending for redelivery.
    Retry,
}

/// Per-message processing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The host accepted the copy and the record was stored.
    Ingested,
    /// The message body carried no usable object key. Nothing to relay,
    /// and redelivery would not change that.
    MissingKey,
    /// The host answered but did not accept the copy.
    Rejected,
    /// A collaborator call failed partway through.
    Failed,
}

impl Outcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            Outcome::Ingested | Outcome::MissingKey => Disposition::Ack,
            Outcome::Rejected | Outcome::Failed => Disposition::Retry,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ingested => "ingested",
            Outcome::MissingKey => "missing_key",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

/// Outcome of one message, paired with its queue id.
#[derive(Debug, Clone)]
pub struct MessageReport {
    pub message_id: String,
    pub outcome: Outcome,
}

impl MessageReport {
    pub fn disposition(&self) -> Disposition {
        self.outcome.disposition()
    }
}

/// How the host answered a copy request.
enum RelayStatus {
    Accepted,
    Rejected,
}

// ============================================================================
// Batch processor
// ============================================================================

/// Processes notification batches against the relay collaborators.
pub struct BatchProcessor {
    bucket: String,
    signer: Arc<dyn UrlSigner>,
    ingest: Arc<dyn IngestApi>,
    records: Arc<dyn RecordStore>,
}

impl BatchProcessor {
    /// Create a processor for objects in `bucket`.
    pub fn new(
        bucket: impl Into<String>,
        signer: Arc<dyn UrlSigner>,
        ingest: Arc<dyn IngestApi>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            signer,
            ingest,
            records,
        }
    }

    /// Process every message in the batch, in order, and report each outcome.
    ///
    /// Reports come back in batch order, one per message, so the caller can
    /// zip them against the batch to apply dispositions.
    pub async fn process_batch(&self, batch: &Batch) -> Vec<MessageReport> {
        let mut reports = Vec::with_capacity(batch.len());

        for message in &batch.messages {
            let start = Instant::now();
            let outcome = self.process_message(message).await;
            record_message(outcome.as_str(), start.elapsed().as_secs_f64());

            reports.push(MessageReport {
                message_id: message.id.clone(),
                outcome,
            });
        }

        reports
    }

    /// Process a single message. Never fails: errors become outcomes.
    async fn process_message(&self, message: &QueueMessage) -> Outcome {
        let notification: UploadNotification = match serde_json::from_value(message.body.clone()) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(
                    "Message {} body is not an upload notification ({}); acking",
                    message.id, e
                );
                return Outcome::MissingKey;
            }
        };

        let object_key = match notification.object_key() {
            Some(key) => key.to_string(),
            None => {
                warn!("Message {} carried no object key; acking", message.id);
                return Outcome::MissingKey;
            }
        };

        debug!("Processing message {} for object {}", message.id, object_key);

        match self.relay(&message.id, &object_key).await {
            Ok(RelayStatus::Accepted) => Outcome::Ingested,
            Ok(RelayStatus::Rejected) => Outcome::Rejected,
            Err(e) => {
                error!(
                    "Error processing message {} (object {}): {}",
                    message.id, object_key, e
                );
                Outcome::Failed
            }
        }
    }

    /// Sign, copy, record. The signed URL stays valid long enough for the
    /// host to fetch the object after the copy call returns.
    async fn relay(&self, message_id: &str, object_key: &str) -> WorkerResult<RelayStatus> {
        let signed_url = self.signer.presign_get(object_key, PRESIGN_TTL).await?;

        let request = CopyRequest::new(signed_url, object_key, self.bucket.clone());
        let video = self.ingest.copy(&request).await?;

        match video.accepted_uid() {
            Some(uid) => {
                let record = IngestRecord::new(uid, video.playback.clone());
                self.records.put_record(object_key, &record).await?;
                info!("Stored ingest record for {} (uid {})", object_key, uid);
                Ok(RelayStatus::Accepted)
            }
            None => {
                let status = video.status.clone().unwrap_or_default();
                error!(
                    "Copy not accepted for {} (message {}): {} - {}",
                    object_key,
                    message_id,
                    status.error_reason_code.as_deref().unwrap_or("unknown"),
                    status.error_reason_text.as_deref().unwrap_or("no detail"),
                );
                Ok(RelayStatus::Rejected)
            }
        }
    }
}
