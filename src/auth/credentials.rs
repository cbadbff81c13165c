//! Credential records
//!
//! A credential record pairs an organization id with exactly one secret,
//! and the secret's variant decides the authentication method.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Authentication method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Pre-issued key sent directly as a header
    #[serde(rename = "apikey")]
    ApiKey,
    /// Signed token exchange, bearer token on every request
    #[serde(rename = "sigv4")]
    SigV4,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::ApiKey => "apikey",
            AuthMethod::SigV4 => "sigv4",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apikey" => Ok(AuthMethod::ApiKey),
            "sigv4" => Ok(AuthMethod::SigV4),
            other => Err(CredentialError::InvalidMethod(other.to_string())),
        }
    }
}

/// Where a credential file is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreLocation {
    /// `~/.vulnetix/credentials.json`
    Home,
    /// `.vulnetix/credentials.json` under the project root
    Project,
}

impl StoreLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreLocation::Home => "home",
            StoreLocation::Project => "project",
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreLocation {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(StoreLocation::Home),
            "project" => Ok(StoreLocation::Project),
            "keyring" => Err(CredentialError::UnsupportedStore("keyring".to_string())),
            other => Err(CredentialError::InvalidStore(other.to_string())),
        }
    }
}

/// Credential errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("no credentials found. Run 'vulnetix auth login' or set VULNETIX_API_KEY + VULNETIX_ORG_ID environment variables")]
    NotFound,

    #[error("invalid credentials in {path}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("invalid auth method '{0}': must be 'apikey' or 'sigv4'")]
    InvalidMethod(String),

    #[error("invalid store '{0}': must be 'home' or 'project'")]
    InvalidStore(String),

    #[error("{0} storage is not yet implemented")]
    UnsupportedStore(String),

    #[error("failed to determine home directory")]
    HomeDirUnavailable,

    #[error("credentials are incomplete: {0}")]
    Incomplete(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove credentials: {}", .failures.join("; "))]
    RemoveFailed { failures: Vec<String> },
}

impl CredentialError {
    /// Remediation hint for the CLI, when one applies
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CredentialError::NotFound | CredentialError::InvalidFormat { .. } => {
                Some("run 'vulnetix auth login' to authenticate")
            }
            CredentialError::HomeDirUnavailable => Some("set HOME or use --store project"),
            _ => None,
        }
    }
}

/// Result type for credential operations
pub type CredentialResult<T> = Result<T, CredentialError>;

/// The secret half of a credential record
#[derive(Clone, PartialEq, Eq)]
pub enum AuthSecret {
    /// Hex API key for the static-header method
    ApiKey(String),
    /// Shared secret for the signing method
    Signing(String),
}

impl fmt::Debug for AuthSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthSecret::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            AuthSecret::Signing(_) => f.write_str("Signing(<redacted>)"),
        }
    }
}

/// Authentication credentials for the Vulnetix API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CredentialRecord", into = "CredentialRecord")]
pub struct Credentials {
    org_id: String,
    secret: AuthSecret,
}

impl Credentials {
    /// Credentials for the static-header method
    pub fn api_key(org_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            secret: AuthSecret::ApiKey(api_key.into()),
        }
    }

    /// Credentials for the signing method
    pub fn signing(org_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            secret: AuthSecret::Signing(secret.into()),
        }
    }

    /// Build credentials for `method`, placing `secret` in the matching slot
    pub fn new(method: AuthMethod, org_id: impl Into<String>, secret: impl Into<String>) -> CredentialResult<Self> {
        let org_id = org_id.into();
        let secret = secret.into();
        if org_id.is_empty() {
            return Err(CredentialError::Incomplete("org_id is empty".to_string()));
        }
        if secret.is_empty() {
            return Err(CredentialError::Incomplete("secret is empty".to_string()));
        }
        Ok(match method {
            AuthMethod::ApiKey => Self::api_key(org_id, secret),
            AuthMethod::SigV4 => Self::signing(org_id, secret),
        })
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn method(&self) -> AuthMethod {
        match self.secret {
            AuthSecret::ApiKey(_) => AuthMethod::ApiKey,
            AuthSecret::Signing(_) => AuthMethod::SigV4,
        }
    }

    pub fn secret(&self) -> &AuthSecret {
        &self.secret
    }

    /// Replace the organization id, keeping the secret
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    /// Static `Authorization` header value, or None for the signing method
    pub fn static_header(&self) -> Option<String> {
        match &self.secret {
            AuthSecret::ApiKey(key) => Some(format!("ApiKey {}:{}", self.org_id, key)),
            AuthSecret::Signing(_) => None,
        }
    }

    /// Secret with everything but the first and last four characters hidden
    pub fn masked_secret(&self) -> String {
        let raw = match &self.secret {
            AuthSecret::ApiKey(s) | AuthSecret::Signing(s) => s,
        };
        mask(raw)
    }
}

fn mask(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= 8 {
        return raw.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// On-disk shape of a credential file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialRecord {
    #[serde(default)]
    org_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    api_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    secret: String,
    method: Option<AuthMethod>,
}

impl TryFrom<CredentialRecord> for Credentials {
    type Error = String;

    fn try_from(record: CredentialRecord) -> Result<Self, Self::Error> {
        if record.org_id.is_empty() {
            return Err("missing org_id".to_string());
        }
        // Files written before `method` existed carry only an api_key
        let method = match record.method {
            Some(m) => m,
            None if !record.api_key.is_empty() => AuthMethod::ApiKey,
            None => AuthMethod::SigV4,
        };
        match method {
            AuthMethod::ApiKey if !record.api_key.is_empty() => {
                Ok(Credentials::api_key(record.org_id, record.api_key))
            }
            AuthMethod::SigV4 if !record.secret.is_empty() => {
                Ok(Credentials::signing(record.org_id, record.secret))
            }
            AuthMethod::ApiKey => Err("method is apikey but api_key is empty".to_string()),
            AuthMethod::SigV4 => Err("method is sigv4 but secret is empty".to_string()),
        }
    }
}

impl From<Credentials> for CredentialRecord {
    fn from(creds: Credentials) -> Self {
        let method = creds.method();
        let (api_key, secret) = match creds.secret {
            AuthSecret::ApiKey(key) => (key, String::new()),
            AuthSecret::Signing(secret) => (String::new(), secret),
        };
        CredentialRecord {
            org_id: creds.org_id,
            api_key,
            secret,
            method: Some(method),
        }
    }
}
