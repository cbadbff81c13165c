//! Vulnetix Protocol Types
//!
//! Defines the JSON bodies exchanged with the Vulnetix API and the
//! GitHub artifacts API, plus the paths and header names both sides agree on.

pub mod error;
pub mod ops;

pub use error::ErrorEnvelope;

/// User agent sent on every Vulnetix API request.
pub const USER_AGENT: &str = concat!("Vulnetix-CLI/", env!("CARGO_PKG_VERSION"));

/// Default base URL for the upload and verification API.
pub const DEFAULT_API_BASE_URL: &str = "https://app.vulnetix.com/api";

/// Default base URL for the vulnerability database API (token exchange lives here).
pub const DEFAULT_VDB_BASE_URL: &str = "https://api.vdb.vulnetix.com/v1";

/// Default base URL for the GitHub Actions artifact transaction API.
pub const DEFAULT_GHA_BASE_URL: &str = "https://api.vulnetix.com";

/// Default GitHub REST API URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Request paths, relative to the relevant base URL.
pub mod paths {
    pub const AUTH_TOKEN: &str = "/auth/token";
    pub const UPLOAD_INITIATE: &str = "/artifact-upload/initiate";
    pub const CLI_VERIFY: &str = "/cli/verify";
    pub const ECOSYSTEMS: &str = "/ecosystems";
    pub const OPENAPI_SPEC: &str = "/spec";

    /// `/artifact-upload/chunk/{session}/{n}`
    pub fn upload_chunk(session_id: &str, chunk_number: u64) -> String {
        format!("/artifact-upload/chunk/{}/{}", session_id, chunk_number)
    }

    /// `/artifact-upload/finalize/{session}`
    pub fn upload_finalize(session_id: &str) -> String {
        format!("/artifact-upload/finalize/{}", session_id)
    }

    /// `/{org}/github/artifact-upload`
    pub fn transaction_initiate(org_id: &str) -> String {
        format!("/{}/github/artifact-upload", org_id)
    }

    /// `/{org}/github/artifact-upload/{txn}`
    pub fn transaction_upload(org_id: &str, txn_id: &str) -> String {
        format!("/{}/github/artifact-upload/{}", org_id, txn_id)
    }

    /// `/{org}/github/artifact-upload/{txn}/status`
    pub fn transaction_status(org_id: &str, txn_id: &str) -> String {
        format!("/{}/github/artifact-upload/{}/status", org_id, txn_id)
    }

    /// `/{org}/github/artifact/{uuid}/status`
    pub fn artifact_status(org_id: &str, artifact_uuid: &str) -> String {
        format!("/{}/github/artifact/{}/status", org_id, artifact_uuid)
    }
}

/// Header names used by the signing scheme and the rate limiter.
pub mod headers {
    pub const AUTHORIZATION: &str = "Authorization";
    pub const AMZ_DATE: &str = "X-Amz-Date";

    pub const RATE_LIMIT_MINUTE_LIMIT: &str = "RateLimit-MinuteLimit";
    pub const RATE_LIMIT_REMAINING: &str = "RateLimit-Remaining";
    pub const RATE_LIMIT_RESET: &str = "RateLimit-Reset";
    pub const RATE_LIMIT_WEEK_LIMIT: &str = "RateLimit-WeekLimit";
    pub const RATE_LIMIT_WEEK_REMAINING: &str = "RateLimit-WeekRemaining";
    pub const RATE_LIMIT_WEEK_RESET: &str = "RateLimit-WeekReset";

    /// All six rate-limit headers, in the order they are reported.
    pub const RATE_LIMIT_ALL: [&str; 6] = [
        RATE_LIMIT_MINUTE_LIMIT,
        RATE_LIMIT_REMAINING,
        RATE_LIMIT_RESET,
        RATE_LIMIT_WEEK_LIMIT,
        RATE_LIMIT_WEEK_REMAINING,
        RATE_LIMIT_WEEK_RESET,
    ];
}
