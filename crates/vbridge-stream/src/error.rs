//! Stream client error types.

use thiserror::Error;

use crate::types::ApiMessage;

/// Result type for Stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur when talking to the Stream API.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to configure Stream client: {0}")]
    ConfigError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Stream API error {code}: {message}")]
    Api { code: i64, message: String },

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

impl StreamError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP status to the matching error variant.
    pub fn from_http_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            401 | 403 => Self::Unauthorized(detail),
            429 => Self::RateLimited(1000),
            s if s >= 500 => Self::ServerError(s, detail),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, detail)),
        }
    }

    /// Build an error from the `errors` array of a v4 envelope.
    pub fn from_envelope(errors: &[ApiMessage]) -> Self {
        match errors.first() {
            Some(e) => Self::Api {
                code: e.code,
                message: e.message.clone(),
            },
            None => Self::RequestFailed("API reported failure without errors".to_string()),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::Network(_) | StreamError::RateLimited(_) | StreamError::ServerError(..)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status_429() {
        let err = StreamError::from_http_status(429, "rate limited");
        assert!(matches!(err, StreamError::RateLimited(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_http_status_503() {
        let err = StreamError::from_http_status(503, "service unavailable");
        assert!(matches!(err, StreamError::ServerError(503, _)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_http_status_403() {
        let err = StreamError::from_http_status(403, "forbidden");
        assert!(matches!(err, StreamError::Unauthorized(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_http_status_400() {
        let err = StreamError::from_http_status(400, "bad request");
        assert!(matches!(err, StreamError::RequestFailed(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_envelope_takes_first_error() {
        let errors = vec![
            ApiMessage {
                code: 10005,
                message: "copy failed".to_string(),
            },
            ApiMessage {
                code: 10000,
                message: "other".to_string(),
            },
        ];
        match StreamError::from_envelope(&errors) {
            StreamError::Api { code, message } => {
                assert_eq!(code, 10005);
                assert_eq!(message, "copy failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_envelope_empty() {
        let err = StreamError::from_envelope(&[]);
        assert!(matches!(err, StreamError::RequestFailed(_)));
    }
}
