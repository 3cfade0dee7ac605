//! Workers KV REST API client.
//!
//! This crate provides:
//! - Key/value reads and writes against a KV namespace
//! - Exponential backoff with jitter for transient failures
//! - Request metrics and tracing spans

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;

pub use client::{KvClient, KvConfig};
pub use error::{KvError, KvResult};
pub use retry::RetryConfig;
