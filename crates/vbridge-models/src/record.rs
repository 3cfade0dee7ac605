//! Durable ingest records.

use serde::{Deserialize, Serialize};

/// Playback URL set Stream reports for a created video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackUrls {
    /// HLS manifest URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls: Option<String>,
    /// DASH manifest URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
}

/// The durable artifact of the relay, written to KV under the object key
/// once Stream has accepted a copy request. Writes are last-write-wins per
/// key, so reprocessing the same upload simply overwrites the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRecord {
    /// Stream video UID assigned by the copy API
    pub uid: String,
    /// Playback metadata, when the copy response carried it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback: Option<PlaybackUrls>,
}

impl IngestRecord {
    pub fn new(uid: impl Into<String>, playback: Option<PlaybackUrls>) -> Self {
        Self {
            uid: uid.into(),
            playback,
        }
    }
}
