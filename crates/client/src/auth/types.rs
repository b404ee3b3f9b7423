//! Token and session types
//!
//! Defines the credential set persisted between requests and the wire shapes
//! exchanged with the refresh endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access and refresh tokens with expiry metadata.
///
/// Overwritten wholesale on every successful login or refresh; the HTTP
/// client never holds a copy beyond the scope of a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token attached to authenticated requests
    pub access_token: String,

    /// Token used to obtain a new access token; absent when the server did
    /// not issue one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// Absolute expiration timestamp (UTC), derived from the server's
    /// `expiresIn` at receipt time
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Create a new `TokenSet` with the expiration computed from a relative
    /// lifetime in seconds.
    ///
    /// Negative lifetimes are clamped to zero so `expires_at` never precedes
    /// the issue time.
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_seconds: i64,
    ) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(expires_in_seconds.max(0));
        Self { access_token, refresh_token, token_type: "Bearer".to_string(), expires_at }
    }

    /// Check whether the access token is expired or will expire within the
    /// given threshold.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(threshold_seconds) >= self.expires_at
    }

    /// Seconds until the access token expires (negative once past expiry).
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }
}

/// Session and tenancy identifiers attached to authenticated requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Society the device is registered against (`X-Society-Code`)
    pub society_code: Option<String>,

    /// Server-issued session identifier (`X-Session-ID`)
    pub session_id: Option<String>,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Payload of a successful refresh response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshData {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until expiry, relative to response receipt time
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    /// Validates expiry derivation from a relative lifetime.
    #[test]
    fn test_token_set_creation() {
        let tokens = TokenSet::new("at-1".to_string(), Some("rt-1".to_string()), 3600);

        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(tokens.token_type, "Bearer");

        let seconds = tokens.seconds_until_expiry();
        assert!(seconds > 3590 && seconds <= 3600);
    }

    /// Validates that negative lifetimes never produce an expiry in the past
    /// of the issue time.
    #[test]
    fn test_negative_lifetime_clamped() {
        let tokens = TokenSet::new("at".to_string(), Some("rt".to_string()), -500);
        assert!(tokens.seconds_until_expiry() >= -1);
        assert!(tokens.is_expired(0));
    }

    /// Validates the threshold-based expiry check.
    #[test]
    fn test_token_expiry_check() {
        let tokens = TokenSet::new("at".to_string(), Some("rt".to_string()), 3600);

        // Not expired with a 5 minute threshold
        assert!(!tokens.is_expired(300));

        // Expired with a threshold larger than the lifetime
        assert!(tokens.is_expired(7200));
    }

    /// Validates the camelCase wire shape of the refresh request.
    #[test]
    fn test_refresh_request_wire_shape() {
        let request = RefreshRequest { refresh_token: "rt-1".to_string() };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"refreshToken": "rt-1"}));
    }

    /// Validates parsing of the refresh response payload.
    #[test]
    fn test_refresh_data_parsing() {
        let data: RefreshData = serde_json::from_value(serde_json::json!({
            "accessToken": "at-2",
            "refreshToken": "rt-2",
            "expiresIn": 3600
        }))
        .unwrap();

        assert_eq!(data.access_token, "at-2");
        assert_eq!(data.refresh_token, "rt-2");
        assert_eq!(data.expires_in, 3600);
    }
}
