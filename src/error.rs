//! Closed error taxonomy shared by every layer of the client.
//!
//! Every fallible operation in this crate returns [`LlmError`]. The variant set is
//! intentionally closed: new failure modes should be expressed by picking the closest
//! existing category rather than growing the enum, so callers can match exhaustively
//! on [`ErrorCategory`].

use std::time::Duration;

/// A structured failure from any layer: auth, transport, streaming, or parsing.
#[derive(thiserror::Error, Debug, Clone)]
pub enum LlmError {
    /// Input failed a client-side check before any request was sent.
    #[error("validation error: {0}")]
    Validation(String),

    /// Credentials were missing, malformed, or rejected by the token endpoint.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Transport-level failure before a response was parsed (DNS, connect, reset).
    #[error("network error: {0}")]
    Network(String),

    /// A deadline elapsed waiting for a response or the next stream chunk.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The server rejected the request with a structured status.
    #[error("api error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        kind: ApiErrorKind,
        retry_after: Option<Duration>,
    },

    /// A response body (unary or SSE event) could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The caller requested cancellation.
    #[error("cancelled")]
    Cancelled,

    /// A configuration value was missing or inconsistent (e.g. platform backend
    /// selected without a project id).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An internal invariant was violated; always a bug if observed.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Sub-kind of [`LlmError::Api`], mirroring the server's error reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    NotFound,
    RateLimit,
    Quota,
    Safety,
    Server,
    Other,
}

/// The seven top-level categories every [`LlmError`] maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Auth,
    Network,
    Timeout,
    Api,
    Parse,
    Cancelled,
}

impl LlmError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Authentication(_) | Self::Configuration(_) => ErrorCategory::Auth,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Api { .. } => ErrorCategory::Api,
            Self::Parse(_) => ErrorCategory::Parse,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Internal(_) => ErrorCategory::Api,
        }
    }

    /// Whether a retry policy may attempt this request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Api { kind, .. } => matches!(kind, ApiErrorKind::RateLimit | ApiErrorKind::Server),
            _ => false,
        }
    }

    /// Server- or header-provided hint for how long to wait before retrying.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn api(status: u16, message: impl Into<String>, kind: ApiErrorKind) -> Self {
        Self::Api {
            status,
            message: message.into(),
            kind,
            retry_after: None,
        }
    }

    pub fn api_with_retry_after(
        status: u16,
        message: impl Into<String>,
        kind: ApiErrorKind,
        retry_after: Duration,
    ) -> Self {
        Self::Api {
            status,
            message: message.into(),
            kind,
            retry_after: Some(retry_after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable_server_error_is_retryable() {
        let rate_limited = LlmError::api(429, "slow down", ApiErrorKind::RateLimit);
        let server = LlmError::api(503, "down", ApiErrorKind::Server);
        let not_found = LlmError::api(404, "missing", ApiErrorKind::NotFound);
        assert!(rate_limited.is_retryable());
        assert!(server.is_retryable());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn validation_and_cancelled_are_never_retryable() {
        assert!(!LlmError::Validation("bad".into()).is_retryable());
        assert!(!LlmError::Cancelled.is_retryable());
    }

    #[test]
    fn category_mapping_covers_all_kinds() {
        assert_eq!(LlmError::Validation(String::new()).category(), ErrorCategory::Validation);
        assert_eq!(LlmError::Authentication(String::new()).category(), ErrorCategory::Auth);
        assert_eq!(LlmError::Network(String::new()).category(), ErrorCategory::Network);
        assert_eq!(LlmError::Timeout(Duration::ZERO).category(), ErrorCategory::Timeout);
        assert_eq!(
            LlmError::api(500, "x", ApiErrorKind::Server).category(),
            ErrorCategory::Api
        );
        assert_eq!(LlmError::Parse(String::new()).category(), ErrorCategory::Parse);
        assert_eq!(LlmError::Cancelled.category(), ErrorCategory::Cancelled);
    }
}
