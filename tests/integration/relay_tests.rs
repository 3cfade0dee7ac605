//! End-to-end relay integration tests.

use vbridge_models::UploadNotification;
use vbridge_queue::{Batch, QueueMessage};
use vbridge_storage::{R2Client, PRESIGN_TTL};
use vbridge_worker::{Outcome, RelayContext, RelaySettings};

/// Test presigned URL generation against a real bucket.
#[tokio::test]
#[ignore = "requires R2 credentials"]
async fn test_presign_get() {
    dotenvy::dotenv().ok();

    let client = R2Client::from_env()
        .await
        .expect("Failed to create R2 client");

    let url = client
        .presign_get("integration/test.mp4", PRESIGN_TTL)
        .await
        .expect("Failed to presign");

    assert!(url.starts_with("https://"));
    assert!(url.contains("X-Amz-Signature="));
    println!("Presigned URL: {}", url);
}

/// Relay one object end to end.
///
/// Needs an object at `integration/test.mp4` in the source bucket plus
/// Stream and KV credentials.
#[tokio::test]
#[ignore = "requires R2, Stream, and KV credentials"]
async fn test_relay_object_end_to_end() {
    dotenvy::dotenv().ok();

    let settings = RelaySettings::from_env().expect("Relay settings incomplete");
    let context = RelayContext::new(&settings)
        .await
        .expect("Failed to build relay clients");
    let processor = context.processor();

    let notification = UploadNotification::for_key("integration/test.mp4");
    let body = serde_json::to_value(&notification).expect("Failed to serialize notification");
    let batch = Batch::new(vec![QueueMessage::new("0-1", body)]);

    let reports = processor.process_batch(&batch).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, Outcome::Ingested);

    let raw = context
        .kv
        .get_value("integration/test.mp4")
        .await
        .expect("Failed to read record")
        .expect("Record missing after relay");
    let record: serde_json::Value = serde_json::from_slice(&raw).expect("Record is not JSON");

    assert!(record["uid"].is_string());
    println!("Ingested uid: {}", record["uid"]);
}
