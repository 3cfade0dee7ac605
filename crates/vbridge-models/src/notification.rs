//! R2 upload event notification payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to the object an event notification is about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    /// Object key within the bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Object size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Entity tag of the stored object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
}

/// Body of an R2 upload event notification.
///
/// The producer side is outside this system, so every field is optional: a
/// partial or empty body still deserializes and is routed through the
/// processor's malformed-message path instead of failing the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadNotification {
    /// Account the bucket belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Action that produced the event, e.g. "PutObject" or
    /// "CompleteMultipartUpload"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Bucket the object was written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// The object the event is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectRef>,
    /// When the event occurred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
}

impl UploadNotification {
    /// Create a minimal notification for the given object key.
    pub fn for_key(key: impl Into<String>) -> Self {
        Self {
            object: Some(ObjectRef {
                key: Some(key.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Extract the object key, treating an empty string as absent.
    pub fn object_key(&self) -> Option<&str> {
        self.object
            .as_ref()?
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
    }
}
