//! Stream API request and response types.

use serde::{Deserialize, Serialize};
use vbridge_models::PlaybackUrls;

/// Metadata attached to a copy request. Stream stores it verbatim on the
/// created video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyMeta {
    /// Display name for the video (the object key)
    pub name: String,
    /// Bucket the source object lives in
    pub bucket: String,
}

/// Request body for `POST /accounts/{account_id}/stream/copy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyRequest {
    /// URL Stream pulls the video from; must stay fetchable until the copy
    /// completes
    pub url: String,
    /// Metadata stored on the created video
    pub meta: CopyMeta,
}

impl CopyRequest {
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            meta: CopyMeta {
                name: name.into(),
                bucket: bucket.into(),
            },
        }
    }
}

/// Ingest state Stream reports for a video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStatus {
    /// Coarse state, e.g. "queued", "inprogress", "error"
    #[serde(default)]
    pub state: Option<String>,
    /// Machine-readable rejection code
    #[serde(default)]
    pub error_reason_code: Option<String>,
    /// Human-readable rejection reason
    #[serde(default)]
    pub error_reason_text: Option<String>,
}

/// A Stream video as returned by the copy API.
///
/// A present, non-empty `uid` means Stream accepted the request and will
/// fetch the source URL. An absent or empty `uid` means the request was
/// rejected and `status` carries the reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamVideo {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub playback: Option<PlaybackUrls>,
    #[serde(default)]
    pub status: Option<IngestStatus>,
}

impl StreamVideo {
    /// The assigned video UID, if Stream accepted the copy request.
    pub fn accepted_uid(&self) -> Option<&str> {
        self.uid.as_deref().filter(|uid| !uid.is_empty())
    }
}

/// Cloudflare v4 API response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub result: Option<T>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
}

/// Error or informational entry in a v4 envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    pub code: i64,
    pub message: String,
}
