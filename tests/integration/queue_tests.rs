//! Redis/Queue integration tests.

use serde_json::json;

use vbridge_models::UploadNotification;
use vbridge_queue::NotificationQueue;

/// Connect to a live Redis and verify the stream is reachable.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    dotenvy::dotenv().ok();

    let queue = NotificationQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    // Test queue length (should not error)
    let len = queue.len().await.expect("Failed to get queue length");
    println!("Queue length: {}", len);
}

/// Test notification publish, consume, and ack cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_publish_consume_ack() {
    dotenvy::dotenv().ok();

    let queue = NotificationQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let notification = UploadNotification::for_key("tests/demo.mp4");
    let message_id = queue
        .publish(&notification)
        .await
        .expect("Failed to publish");
    println!("Published notification with message ID {}", message_id);

    let batch = queue
        .consume("test-consumer", 1000, 10)
        .await
        .expect("Failed to consume");
    assert!(!batch.is_empty());

    let message = batch
        .messages
        .iter()
        .find(|m| m.id == message_id)
        .expect("Published message not in batch");
    assert_eq!(message.body["object"]["key"], json!("tests/demo.mp4"));

    queue.ack(&message.id).await.expect("Failed to ack");
    println!("Message {} acknowledged", message.id);
}

/// Test that a retried message stays pending and another consumer can
/// claim it.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_retry_then_claim() {
    dotenvy::dotenv().ok();

    let queue = NotificationQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let notification = UploadNotification::for_key("tests/retry.mp4");
    let message_id = queue
        .publish(&notification)
        .await
        .expect("Failed to publish");

    let batch = queue
        .consume("test-consumer-a", 1000, 10)
        .await
        .expect("Failed to consume");
    assert!(batch.messages.iter().any(|m| m.id == message_id));

    // Not acked: the attempt counter goes up and the entry stays pending
    let attempts = queue.retry(&message_id).await.expect("Failed to retry");
    assert!(attempts >= 1);
    println!("Retry attempt {}", attempts);

    // A different consumer claims it once it has idled long enough
    let claimed = queue
        .claim_pending("test-consumer-b", 0, 10)
        .await
        .expect("Failed to claim");
    assert!(claimed.messages.iter().any(|m| m.id == message_id));

    queue.ack(&message_id).await.expect("Failed to ack");
}

/// Test whole-batch deferral: nothing acked, everything claimable again.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_retry_all_leaves_batch_claimable() {
    dotenvy::dotenv().ok();

    let queue = NotificationQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let first = queue
        .publish(&UploadNotification::for_key("tests/defer-a.mp4"))
        .await
        .expect("Failed to publish");
    let second = queue
        .publish(&UploadNotification::for_key("tests/defer-b.mp4"))
        .await
        .expect("Failed to publish");

    let batch = queue
        .consume("test-consumer-a", 1000, 10)
        .await
        .expect("Failed to consume");
    assert!(batch.messages.iter().any(|m| m.id == first));
    assert!(batch.messages.iter().any(|m| m.id == second));

    // Defers the whole batch without per-message work or counter bumps
    queue.retry_all(&batch);

    let claimed = queue
        .claim_pending("test-consumer-b", 0, 10)
        .await
        .expect("Failed to claim");
    assert!(claimed.messages.iter().any(|m| m.id == first));
    assert!(claimed.messages.iter().any(|m| m.id == second));

    queue.ack(&first).await.expect("Failed to ack");
    queue.ack(&second).await.expect("Failed to ack");
}

/// Test DLQ functionality.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dlq() {
    dotenvy::dotenv().ok();

    let queue = NotificationQueue::from_env().expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    let message_id = queue
        .publish(&UploadNotification::for_key("tests/dlq.mp4"))
        .await
        .expect("Failed to publish");

    let batch = queue
        .consume("test-dlq-consumer", 1000, 10)
        .await
        .expect("Failed to consume");
    let message = batch
        .messages
        .iter()
        .find(|m| m.id == message_id)
        .expect("Published message not in batch");

    queue
        .dlq(&message.id, &message.body, "Test error")
        .await
        .expect("Failed to move to DLQ");

    let dlq_len = queue.dlq_len().await.expect("Failed to get DLQ length");
    assert!(dlq_len > 0);
    println!("DLQ length: {}", dlq_len);
}
