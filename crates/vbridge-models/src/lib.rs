//! Shared data models for the VBridge relay.
//!
//! Serde-serializable types shared across the relay:
//! - R2 upload event notifications consumed from the queue
//! - Ingest records persisted to Workers KV
//! - Stream playback URL metadata

pub mod notification;
pub mod record;

// Re-export common types
pub use notification::{ObjectRef, UploadNotification};
pub use record::{IngestRecord, PlaybackUrls};
