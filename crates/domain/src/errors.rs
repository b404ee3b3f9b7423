//! Error types surfaced by the SocietyHub API client
//!
//! All recovery (token refresh, the single automatic retry) happens inside the
//! client. Once the client decides to fail, callers always receive a fully
//! formed [`ClientError`] — never a raw transport error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback message used when neither the response body nor the transport
/// provides anything human-readable.
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Error taxonomy for terminal request failures.
///
/// Serialized in wire form (`NETWORK_ERROR`, `TIMEOUT_ERROR`, ...) so the
/// codes match what the mobile clients log and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No connectivity; the request never reached the server
    NetworkError,

    /// Transport deadline exceeded
    TimeoutError,

    /// HTTP 403 — permission issue
    Forbidden,

    /// HTTP 404 — resource issue
    NotFound,

    /// HTTP 422 — caller can fix the input and retry
    ValidationError,

    /// Anything else, including a 401 that survived a failed refresh
    ApiError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ApiError => "API_ERROR",
        };
        f.write_str(name)
    }
}

/// Terminal failure surfaced to callers of the API client.
///
/// Immutable once constructed. `status` is the HTTP status code that produced
/// the error, `0` when the request never received a response, and `408` for
/// transport timeouts.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code} (status {status}): {message}")]
pub struct ClientError {
    /// Classification of the failure
    pub code: ErrorCode,

    /// HTTP status code associated with the failure
    pub status: u16,

    /// Human-readable message
    pub message: String,

    /// Structured payload attached by the server (validation details,
    /// permission context), if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ClientError {
    /// Build an error with an explicit code and status.
    #[must_use]
    pub fn new(code: ErrorCode, status: u16, message: impl Into<String>) -> Self {
        Self { code, status, message: message.into(), details: None }
    }

    /// Attach the raw response body as structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Request never reached the server (no connectivity).
    #[must_use]
    pub fn network() -> Self {
        Self::new(ErrorCode::NetworkError, 0, "Network unavailable. Check your connection.")
    }

    /// Transport deadline exceeded.
    #[must_use]
    pub fn timeout() -> Self {
        Self::new(ErrorCode::TimeoutError, 408, "Request timed out. Please try again.")
    }

    /// HTTP 403.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, 403, message)
    }

    /// HTTP 404.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, 404, message)
    }

    /// HTTP 422.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, 422, message)
    }

    /// Generic API failure with the originating status code.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiError, status, message)
    }

    /// Whether the caller can sensibly retry or fix the request.
    ///
    /// Network and timeout failures should prompt a retry; validation
    /// failures are fixable by the caller. Permission and resource errors are
    /// not recoverable client-side.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::NetworkError | ErrorCode::TimeoutError | ErrorCode::ValidationError
        )
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
