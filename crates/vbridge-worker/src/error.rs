//! Error types for the relay worker.

use thiserror::Error;

/// Worker error type.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vbridge_storage::StorageError),

    #[error("Stream error: {0}")]
    Stream(#[from] vbridge_stream::StreamError),

    #[error("KV error: {0}")]
    Kv(#[from] vbridge_kv::KvError),

    #[error("Queue error: {0}")]
    Queue(#[from] vbridge_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Result type alias for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;
