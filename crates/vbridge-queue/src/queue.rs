//! Notification queue over Redis Streams.
//!
//! Upload notifications are XADDed to a stream and consumed through a
//! consumer group. A delivered message stays in the pending entries list
//! until it is acked; retry therefore means "leave it pending and bump the
//! attempt counter", and redelivery happens when a consumer claims entries
//! that have idled past a threshold.

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, info, warn};

use vbridge_models::UploadNotification;

use crate::error::{QueueError, QueueResult};
use crate::message::{Batch, QueueMessage};

const DEFAULT_STREAM: &str = "vbridge:notifications";
const DEFAULT_GROUP: &str = "vbridge:relay";
const DEFAULT_DLQ_STREAM: &str = "vbridge:dlq";
const DEFAULT_MAX_RETRIES: u32 = 3;

/// TTL on per-message retry counters, in seconds.
const RETRY_COUNTER_TTL_SECS: i64 = 86_400;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream the notifications are published to
    pub stream_name: String,
    /// Consumer group the relay workers join
    pub consumer_group: String,
    /// Dead letter stream for messages past the retry cap
    pub dlq_stream_name: String,
    /// Attempts before a message lands in the dead letter stream
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: DEFAULT_STREAM.to_string(),
            consumer_group: DEFAULT_GROUP.to_string(),
            dlq_stream_name: DEFAULT_DLQ_STREAM.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            max_retries: std::env::var("QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// Notification queue client.
#[derive(Debug)]
pub struct NotificationQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl NotificationQueue {
    /// Create a new notification queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    async fn conn(&self) -> QueueResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Create the consumer group if it does not exist yet.
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            // BUSYGROUP on create means the group is already there
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    "Consumer group already exists: {}",
                    self.config.consumer_group
                );
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Publish an upload notification onto the stream.
    pub async fn publish(&self, notification: &UploadNotification) -> QueueResult<String> {
        let mut conn = self.conn().await?;

        let payload = serde_json::to_string(notification)?;

        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.config.stream_name)
            .arg("*")
            .arg("body")
            .arg(&payload);
        // Store the key alongside the body for stream introspection
        if let Some(key) = notification.object_key() {
            cmd.arg("key").arg(key);
        }

        let message_id: String = cmd.query_async(&mut conn).await?;

        match notification.object_key() {
            Some(key) => info!("Published notification {} for {}", message_id, key),
            None => info!("Published notification {} without object key", message_id),
        }

        Ok(message_id)
    }

    /// Acknowledge a message (completed, never redelivered).
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        // A settled message has no further readers; drop it from the stream
        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged message: {}", message_id);
        Ok(())
    }

    /// Mark a message for redelivery and return its new attempt count.
    ///
    /// The entry stays in the pending list; the claim loop hands it back to
    /// a consumer once it has been idle long enough.
    pub async fn retry(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.conn().await?;

        let counter = self.retry_counter_key(message_id);
        let attempts: u32 = conn.incr(&counter, 1).await?;
        conn.expire::<_, ()>(&counter, RETRY_COUNTER_TTL_SECS).await?;
        Ok(attempts)
    }

    /// Defer an entire delivered batch for redelivery.
    ///
    /// Unacknowledged entries stay in the pending list and come back through
    /// the claim loop, so deferral writes nothing. Retry counters are left
    /// untouched: deferral is not a failed attempt.
    pub fn retry_all(&self, batch: &Batch) {
        info!("Deferred batch of {} messages for redelivery", batch.len());
    }

    /// Move a message to the dead letter stream and ack the original.
    pub async fn dlq(&self, message_id: &str, body: &Value, error: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let payload = serde_json::to_string(body)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("body")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!("Moved message {} to DLQ: {}", message_id, error);
        Ok(())
    }

    /// Read the next batch of notifications for this consumer.
    ///
    /// Blocks up to `block_ms` waiting for messages. Bodies that are not
    /// valid JSON at all are acked on the spot; they can never become
    /// processable and must not recirculate.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Batch> {
        let mut conn = self.conn().await?;

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only never-delivered entries
            .query_async(&mut conn)
            .await?;

        let mut messages = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                if let Some(message) = self.decode_entry(&entry.id, &entry.map).await {
                    debug!("Consumed message {} from stream", message.id);
                    messages.push(message);
                }
            }
        }

        Ok(Batch::new(messages))
    }

    /// Claim pending messages that have been idle for too long.
    ///
    /// Covers both messages marked for retry and messages stranded by a
    /// crashed consumer.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Batch> {
        let mut conn = self.conn().await?;

        let reply: redis::streams::StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0") // Scan the whole pending list
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut messages = Vec::new();
        for entry in reply.claimed {
            if let Some(message) = self.decode_entry(&entry.id, &entry.map).await {
                info!("Claimed pending message {} from stream", message.id);
                messages.push(message);
            }
        }

        Ok(Batch::new(messages))
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    /// Get max retries from config.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    fn retry_counter_key(&self, message_id: &str) -> String {
        format!("vbridge:retry:{}", message_id)
    }

    /// Turn a raw stream entry into a queue message, acking entries whose
    /// body field is missing or not JSON.
    async fn decode_entry(
        &self,
        entry_id: &str,
        fields: &std::collections::HashMap<String, redis::Value>,
    ) -> Option<QueueMessage> {
        let payload = match fields.get("body") {
            Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => {
                warn!("Entry {} has no body field, acking", entry_id);
                self.ack(entry_id).await.ok();
                return None;
            }
        };

        match serde_json::from_str::<Value>(&payload) {
            Ok(body) => Some(QueueMessage::new(entry_id, body)),
            Err(e) => {
                warn!("Entry {} body is not JSON ({}), acking", entry_id, e);
                self.ack(entry_id).await.ok();
                None
            }
        }
    }
}
