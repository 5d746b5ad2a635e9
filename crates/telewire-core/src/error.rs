//! Unified error types for the telewire core.
//!
//! This module provides the error taxonomy shared by every layer: transport
//! failures, remote (Bot API) failures and matcher construction failures.
//! Configuration and runtime errors are defined in `telewire-runtime`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur while performing a single outbound call.
///
/// Every variant is a *transient* failure from the polling loop's point of
/// view: a tick that hits one of these backs off and retries once.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The call did not complete within its timeout.
    #[error("request to '{method}' timed out")]
    Timeout {
        /// The remote operation name.
        method: String,
    },

    /// The connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote answered with a non-success status and no structured body.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body (possibly empty).
        body: String,
    },

    /// Staging an attachment through the temporary directory failed.
    #[error("failed to stage attachment: {0}")]
    Staging(String),

    /// Parameters could not be encoded into a request.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Staging(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for remote API calls made on behalf of a caller.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The remote service answered with `ok: false`.
    #[error("remote error ({}): {description}", error_code.map_or_else(|| "-".to_string(), |c| c.to_string()))]
    Remote {
        /// The `error_code` field, when present.
        error_code: Option<i64>,
        /// The `description` field, or a placeholder when missing.
        description: String,
    },

    /// The response body was not a `{ok, ...}` envelope.
    #[error("unexpected response body: {0}")]
    UnexpectedResponse(String),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    /// Returns `true` if this error is worth retrying (a transport failure).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::UnexpectedResponse(err.to_string())
    }
}

// =============================================================================
// Matcher Errors
// =============================================================================

/// Errors raised when building a match specifier.
#[derive(Debug, Clone, Error)]
pub enum MatcherError {
    /// The pattern text is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern text.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = ApiError::Remote {
            error_code: Some(400),
            description: "Bad Request: chat not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "remote error (400): Bad Request: chat not found"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transport_errors_are_transient() {
        let err: ApiError = TransportError::Timeout {
            method: "getUpdates".into(),
        }
        .into();
        assert!(err.is_transient());
    }
}
