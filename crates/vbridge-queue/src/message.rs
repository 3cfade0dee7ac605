//! Messages and batches delivered to consumers.

use serde_json::Value;

/// One notification message on loan to a consumer for a single delivery
/// attempt. Each delivered message must be disposed of exactly once, either
/// by acking it or by marking it for retry.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Stream entry id; opaque to consumers
    pub id: String,
    /// Raw notification body as published
    pub body: Value,
}

impl QueueMessage {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

/// An ordered batch of messages delivered together. Consumers see messages
/// in delivery order.
#[derive(Debug, Default)]
pub struct Batch {
    pub messages: Vec<QueueMessage>,
}

impl Batch {
    pub fn new(messages: Vec<QueueMessage>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
