//! Workers KV integration tests.

use vbridge_kv::KvClient;
use vbridge_models::{IngestRecord, PlaybackUrls};

/// Test record write and read back.
#[tokio::test]
#[ignore = "requires Cloudflare KV credentials"]
async fn test_put_get_record() {
    dotenvy::dotenv().ok();

    let client = KvClient::from_env().expect("Failed to create KV client");

    let record = IngestRecord::new(
        "integration-test-uid",
        Some(PlaybackUrls {
            hls: Some(
                "https://videodelivery.net/integration-test-uid/manifest/video.m3u8".to_string(),
            ),
            dash: None,
        }),
    );

    client
        .put_json("integration/test.mp4", &record)
        .await
        .expect("Failed to write record");

    let raw = client
        .get_value("integration/test.mp4")
        .await
        .expect("Failed to read record")
        .expect("Record missing after write");
    let parsed: serde_json::Value = serde_json::from_slice(&raw).expect("Record is not JSON");

    assert_eq!(parsed["uid"], "integration-test-uid");
    println!("Record: {}", parsed);
}

/// A repeated write for the same key replaces the record.
#[tokio::test]
#[ignore = "requires Cloudflare KV credentials"]
async fn test_put_overwrites() {
    dotenvy::dotenv().ok();

    let client = KvClient::from_env().expect("Failed to create KV client");

    client
        .put_json(
            "integration/overwrite.mp4",
            &IngestRecord::new("first-uid", None),
        )
        .await
        .expect("Failed to write first record");
    client
        .put_json(
            "integration/overwrite.mp4",
            &IngestRecord::new("second-uid", None),
        )
        .await
        .expect("Failed to write second record");

    let raw = client
        .get_value("integration/overwrite.mp4")
        .await
        .expect("Failed to read record")
        .expect("Record missing after write");
    let parsed: serde_json::Value = serde_json::from_slice(&raw).expect("Record is not JSON");

    assert_eq!(parsed["uid"], "second-uid");
}

/// Missing keys read back as None, not an error.
#[tokio::test]
#[ignore = "requires Cloudflare KV credentials"]
async fn test_get_missing_key() {
    dotenvy::dotenv().ok();

    let client = KvClient::from_env().expect("Failed to create KV client");

    let value = client
        .get_value("integration/definitely-missing")
        .await
        .expect("Read should not error");
    assert!(value.is_none());
}
