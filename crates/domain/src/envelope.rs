//! Response envelope returned by the SocietyHub REST API
//!
//! Every endpoint wraps its payload in `{"success": bool, "data": ...}`.
//! Error bodies are unstructured; [`extract_error_message`] probes them
//! defensively instead of trusting a fixed schema.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DEFAULT_ERROR_MESSAGE;

/// Parsed response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the server reports the operation as successful
    pub success: bool,

    /// Endpoint-specific payload
    pub data: T,
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Parse an envelope from a raw JSON value.
    ///
    /// # Errors
    /// Returns the serde error when the body does not match the envelope
    /// shape.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Extract a human-readable message from an unstructured error body.
///
/// Priority order: the body's top-level `message`, then `error.message`, then
/// the transport's own message, then a fixed fallback.
#[must_use]
pub fn extract_error_message(body: Option<&Value>, transport_message: Option<&str>) -> String {
    if let Some(body) = body {
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            if !message.is_empty() {
                return message.to_string();
            }
        }

        if let Some(message) =
            body.get("error").and_then(|e| e.get("message")).and_then(Value::as_str)
        {
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }

    match transport_message {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => DEFAULT_ERROR_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for envelope.
    use serde_json::json;

    use super::*;

    /// Validates envelope parsing for a typed payload.
    #[test]
    fn test_envelope_parsing() {
        #[derive(Debug, Deserialize)]
        struct Visitor {
            name: String,
        }

        let body = json!({"success": true, "data": {"name": "Asha"}});
        let envelope: ApiResponse<Visitor> = ApiResponse::from_value(body).unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data.name, "Asha");
    }

    /// Validates the message extraction priority order.
    #[test]
    fn test_message_priority_top_level_wins() {
        let body = json!({"message": "top", "error": {"message": "nested"}});
        assert_eq!(extract_error_message(Some(&body), Some("transport")), "top");
    }

    #[test]
    fn test_message_priority_nested_error() {
        let body = json!({"error": {"message": "nested"}});
        assert_eq!(extract_error_message(Some(&body), Some("transport")), "nested");
    }

    #[test]
    fn test_message_priority_transport_fallback() {
        let body = json!({"unexpected": true});
        assert_eq!(extract_error_message(Some(&body), Some("transport")), "transport");
    }

    #[test]
    fn test_message_fixed_fallback() {
        assert_eq!(extract_error_message(None, None), DEFAULT_ERROR_MESSAGE);
        let body = json!({"message": ""});
        assert_eq!(extract_error_message(Some(&body), None), DEFAULT_ERROR_MESSAGE);
    }

    /// Non-string `message` fields are ignored rather than stringified.
    #[test]
    fn test_non_string_message_ignored() {
        let body = json!({"message": 42});
        assert_eq!(extract_error_message(Some(&body), Some("transport")), "transport");
    }
}
