//! Error envelope returned by the Vulnetix API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error body the service sends with 4xx/5xx responses.
///
/// `{"success": false, "error": "...", "details": "..."}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false on error responses.
    #[serde(default)]
    pub success: bool,
    /// Human-readable, single-line error message.
    pub error: String,
    /// Optional extra context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorEnvelope {
    /// Parse an error body, returning None unless it has the envelope shape.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.details.as_deref() {
            Some(details) if !details.is_empty() => write!(f, "{} - {}", self.error, details),
            _ => write!(f, "{}", self.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_envelope() {
        let env = ErrorEnvelope::parse(br#"{"success":false,"error":"bad","details":"why"}"#).unwrap();
        assert_eq!(env.error, "bad");
        assert_eq!(env.details.as_deref(), Some("why"));
        assert_eq!(env.to_string(), "bad - why");
    }

    #[test]
    fn test_parse_without_details() {
        let env = ErrorEnvelope::parse(br#"{"error":"nope"}"#).unwrap();
        assert_eq!(env.to_string(), "nope");
    }

    #[test]
    fn test_non_envelope_body() {
        assert!(ErrorEnvelope::parse(b"<html>502</html>").is_none());
        assert!(ErrorEnvelope::parse(br#"{"message":"x"}"#).is_none());
    }
}
