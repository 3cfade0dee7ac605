//! Cloudflare Stream copy API client.
//!
//! This crate provides:
//! - Copy-from-URL requests against the Stream API
//! - Cloudflare v4 envelope handling
//! - Retry with exponential backoff for transient failures

pub mod client;
pub mod error;
pub mod types;

pub use client::{StreamClient, StreamConfig, DEFAULT_API_BASE};
pub use error::{StreamError, StreamResult};
pub use types::{ApiEnvelope, ApiMessage, CopyMeta, CopyRequest, IngestStatus, StreamVideo};
