//! Batch executor: consumes notification batches and applies dispositions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vbridge_queue::{Batch, NotificationQueue};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics::{record_batch, record_dlq, set_queue_depth};
use crate::processor::{BatchProcessor, Disposition};

/// Drives the consume loop and a background claim loop, and applies each
/// message's disposition after processing.
pub struct BatchExecutor {
    config: WorkerConfig,
    queue: Arc<NotificationQueue>,
    processor: Arc<BatchProcessor>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl BatchExecutor {
    /// Create a new batch executor.
    pub fn new(
        config: WorkerConfig,
        queue: Arc<NotificationQueue>,
        processor: BatchProcessor,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("relay-{}", Uuid::new_v4());

        Self {
            config,
            queue,
            processor: Arc::new(processor),
            shutdown,
            consumer_name,
        }
    }

    /// Run until shutdown is signalled.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting batch executor '{}' (batch size {})",
            self.consumer_name, self.config.batch_size
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Claim loop: picks up messages idle past the threshold, which covers
        // both retries and deliveries stranded by a crashed consumer.
        let queue = Arc::clone(&self.queue);
        let processor = Arc::clone(&self.processor);
        let consumer_name = self.consumer_name.clone();
        let claim_interval = self.config.claim_interval;
        let claim_min_idle = self.config.claim_min_idle;
        let batch_size = self.config.batch_size;
        let mut claim_shutdown_rx = self.shutdown.subscribe();

        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = claim_shutdown_rx.changed() => {
                        if *claim_shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue
                            .claim_pending(
                                &consumer_name,
                                claim_min_idle.as_millis() as u64,
                                batch_size,
                            )
                            .await
                        {
                            Ok(batch) if !batch.is_empty() => {
                                info!("Claimed {} pending messages", batch.len());
                                Self::handle_batch(&processor, &queue, batch).await;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending messages: {}", e);
                            }
                        }

                        if let (Ok(queue_len), Ok(dlq_len)) =
                            (queue.len().await, queue.dlq_len().await)
                        {
                            set_queue_depth(queue_len, dlq_len);
                        }
                    }
                }
            }
        });

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_once() => {
                    if let Err(e) = result {
                        error!("Error consuming notifications: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Batch executor stopped");
        Ok(())
    }

    /// Signal shutdown. `run` returns after the in-flight batch settles.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn consume_once(&self) -> WorkerResult<()> {
        let batch = self
            .queue
            .consume(
                &self.consumer_name,
                self.config.consume_block.as_millis() as u64,
                self.config.batch_size,
            )
            .await?;

        if batch.is_empty() {
            return Ok(());
        }

        // A batch read right as shutdown lands is deferred whole: no
        // per-message work, everything comes back through redelivery.
        if *self.shutdown.borrow() {
            self.queue.retry_all(&batch);
            return Ok(());
        }

        debug!("Consumed batch of {} messages", batch.len());
        record_batch(batch.len());

        Self::handle_batch(&self.processor, &self.queue, batch).await;
        Ok(())
    }

    /// Process one batch and apply each report's disposition in order.
    async fn handle_batch(processor: &BatchProcessor, queue: &NotificationQueue, batch: Batch) {
        let reports = processor.process_batch(&batch).await;

        for (message, report) in batch.messages.iter().zip(&reports) {
            match report.disposition() {
                Disposition::Ack => {
                    if let Err(e) = queue.ack(&message.id).await {
                        error!("Failed to ack message {}: {}", message.id, e);
                    }
                }
                Disposition::Retry => match queue.retry(&message.id).await {
                    Ok(attempts) if attempts >= queue.max_retries() => {
                        warn!(
                            "Message {} exceeded max retries ({}), moving to DLQ",
                            message.id,
                            queue.max_retries()
                        );
                        record_dlq();
                        if let Err(e) = queue
                            .dlq(&message.id, &message.body, report.outcome.as_str())
                            .await
                        {
                            error!("Failed to move message {} to DLQ: {}", message.id, e);
                        }
                    }
                    Ok(attempts) => {
                        info!(
                            "Message {} left pending for redelivery (attempt {}/{})",
                            message.id,
                            attempts,
                            queue.max_retries()
                        );
                    }
                    Err(e) => {
                        // The message is still pending, so the claim loop
                        // brings it back; only the attempt count was lost.
                        error!("Failed to record retry for message {}: {}", message.id, e);
                    }
                },
            }
        }
    }
}
