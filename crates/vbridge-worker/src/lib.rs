//! VBridge relay worker
//!
//! Consumes upload notifications from the queue and relays each object to
//! the video host: a time-limited signed URL is generated for the uploaded
//! object, handed to the host's copy endpoint, and the resulting ingest
//! record is written to the KV store under the object key.
//!
//! This crate provides:
//! - Batch processor with per-message outcomes and ack/retry dispositions
//! - Batch executor with a claim loop for stalled deliveries
//! - Eager startup validation of required configuration
//! - HTTP surface with health probes and Prometheus metrics

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod http;
pub mod metrics;
pub mod processor;

pub use config::WorkerConfig;
pub use context::{RelayContext, RelaySettings};
pub use error::{WorkerError, WorkerResult};
pub use executor::BatchExecutor;
pub use processor::{BatchProcessor, Disposition, MessageReport, Outcome};
