//! KV error types.

use thiserror::Error;

/// Result type for KV operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors that can occur during Workers KV operations.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error {0}: {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KvError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map an HTTP status to the matching error variant.
    pub fn from_http_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            401 | 403 => Self::AuthError(detail),
            404 => Self::NotFound(detail),
            429 => Self::RateLimited(1000),
            s if s >= 500 => Self::ServerError(s, detail),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, detail)),
        }
    }

    /// HTTP status this error corresponds to, when one exists.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            KvError::AuthError(_) => Some(401),
            KvError::NotFound(_) => Some(404),
            KvError::RateLimited(_) => Some(429),
            KvError::ServerError(status, _) => Some(*status),
            _ => None,
        }
    }

    /// Server-requested retry delay, when one was given.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            KvError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KvError::Network(_) | KvError::RateLimited(_) | KvError::ServerError(..)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status_429() {
        let err = KvError::from_http_status(429, "rate limited");
        assert!(matches!(err, KvError::RateLimited(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_http_status_500() {
        let err = KvError::from_http_status(500, "internal error");
        assert!(matches!(err, KvError::ServerError(500, _)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_http_status_404() {
        let err = KvError::from_http_status(404, "not found");
        assert!(matches!(err, KvError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_http_status_403() {
        let err = KvError::from_http_status(403, "forbidden");
        assert!(matches!(err, KvError::AuthError(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(KvError::RateLimited(1000).http_status(), Some(429));
        assert_eq!(
            KvError::ServerError(502, "bad gateway".into()).http_status(),
            Some(502)
        );
        assert_eq!(KvError::NotFound("key".into()).http_status(), Some(404));
    }

    #[test]
    fn test_retry_after_ms() {
        assert_eq!(KvError::RateLimited(5000).retry_after_ms(), Some(5000));
        assert_eq!(
            KvError::ServerError(500, "error".into()).retry_after_ms(),
            None
        );
    }
}
