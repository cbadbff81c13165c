//! Authenticated client errors

use crate::auth::{CredentialError, SigningError};

use super::ratelimit::RateLimit;
use super::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("request signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("token exchange failed: {message}")]
    TokenExchange { status: Option<u16>, message: String },

    #[error("rate limit exceeded: {message} ({guidance})")]
    RateLimited {
        message: String,
        guidance: String,
        rate_limit: RateLimit,
    },

    #[error("API error (status {status}): {message}{}", details_suffix(.details))]
    Status {
        status: u16,
        message: String,
        details: Option<String>,
        body: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid path segment '{value}': {reason}")]
    InvalidPath { value: String, reason: &'static str },
}

fn details_suffix(details: &Option<String>) -> String {
    details
        .as_deref()
        .map(|d| format!(" - {}", d))
        .unwrap_or_default()
}

impl ApiError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ApiError::Credentials(e) => e.hint(),
            ApiError::TokenExchange { .. } => {
                Some("check VVD_ORG/VVD_SECRET or run 'vulnetix auth login --method sigv4'")
            }
            ApiError::Status { status: 401, .. } | ApiError::Status { status: 403, .. } => {
                Some("credentials were rejected; run 'vulnetix auth verify'")
            }
            ApiError::RateLimited { .. } => Some("wait for the quota to reset and try again"),
            _ => None,
        }
    }

    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::TokenExchange { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
