//! GitHub Actions integration
//!
//! Collects the artifacts of the current workflow run from the GitHub API,
//! extracts each one into a guarded temporary directory and uploads it to
//! the Vulnetix transaction API.

mod collector;
mod extract;
mod metadata;
mod uploader;

use std::io;
use std::path::PathBuf;

use crate::cancel::Interrupted;
use crate::client::{ApiError, TransportError};

pub use collector::{sanitize_artifact_name, ArtifactCollector, ExtractedArtifact};
pub use extract::extract_zip;
pub use metadata::{collect_metadata, GithubContext, EXTRA_ENV_KEYS};
pub use uploader::{
    ArtifactOutcome, ArtifactUploader, FailureStage, TransactionReport, TransactionState,
};

/// Largest artifact accepted for download
pub const MAX_ARTIFACT_SIZE: u64 = 1024 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum GhaError {
    #[error("invalid transaction id: {0}")]
    InvalidTransactionId(#[source] ApiError),

    #[error("artifact UUID cannot be empty")]
    EmptyArtifactUuid,

    #[error("GitHub token is required. Set GITHUB_TOKEN environment variable")]
    MissingToken,

    #[error("not running in GitHub Actions: {0} is not set")]
    MissingEnv(&'static str),

    #[error("artifact size ({size} bytes) exceeds maximum allowed size ({max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("no files found in artifact directory: {}", .0.display())]
    NoFiles(PathBuf),

    #[error("zip entry '{entry}' escapes the extraction directory")]
    ZipSlipDetected { entry: String },

    #[error("invalid artifact archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("GitHub API returned status {status}: {body}")]
    GithubStatus { status: u16, body: String },

    #[error("GitHub request failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{operation} failed: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
}

impl GhaError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            GhaError::MissingToken => Some("pass `GITHUB_TOKEN: ${{ secrets.GITHUB_TOKEN }}` to the step"),
            GhaError::MissingEnv(_) => Some("run this command inside a GitHub Actions workflow"),
            GhaError::Api(e) => e.hint(),
            _ => None,
        }
    }

    /// Whether the error means the user or a deadline stopped the run
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            GhaError::Interrupted(_)
                | GhaError::Transport(TransportError::Interrupted(_))
                | GhaError::Api(ApiError::Transport(TransportError::Interrupted(_)))
        )
    }
}

/// Result type for GitHub Actions operations
pub type GhaResult<T> = Result<T, GhaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_interrupted() {
        let wrapped = GhaError::Api(ApiError::Transport(TransportError::Interrupted(Interrupted::Cancelled)));
        assert!(wrapped.is_interrupted());
        assert!(GhaError::Interrupted(Interrupted::DeadlineExceeded).is_interrupted());
        assert!(GhaError::Transport(TransportError::Interrupted(Interrupted::Cancelled)).is_interrupted());

        assert!(!GhaError::Api(ApiError::Transport(TransportError::Connect("refused".into()))).is_interrupted());
        assert!(!GhaError::MissingToken.is_interrupted());
    }
}
