//! Redis Streams notification queue.
//!
//! This crate provides:
//! - Publishing upload notifications onto a stream
//! - Batch consumption through a consumer group
//! - Per-message ack/retry, batch deferral, and a dead-letter stream
//! - Claiming of stale pending messages for redelivery

pub mod error;
pub mod message;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use message::{Batch, QueueMessage};
pub use queue::{NotificationQueue, QueueConfig};
