//! Cloudflare R2 storage client.
//!
//! This crate provides:
//! - Presigned GET URL generation via the S3 API
//! - Bucket connectivity checks for readiness probes

pub mod client;
pub mod error;

pub use client::{R2Client, R2Config, PRESIGN_TTL};
pub use error::{StorageError, StorageResult};
