//! Artifact listing and download from the GitHub REST API

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vulnetix_protocol::ops::{ArtifactsResponse, GithubArtifact};

use crate::cancel::CancelToken;
use crate::client::{HttpRequest, HttpResponse, Transport};

use super::extract::extract_zip;
use super::metadata::GithubContext;
use super::{GhaError, GhaResult, MAX_ARTIFACT_SIZE};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Default timeout for listing requests
pub const LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default overall timeout for one artifact download
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Make an artifact name safe for a temp directory prefix
///
/// Characters outside `[A-Za-z0-9._-]` become `_` and leading dots are
/// dropped; an empty result becomes `artifact`.
pub fn sanitize_artifact_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}

/// An artifact extracted into a temporary directory
///
/// The directory and everything in it is removed when this is dropped.
#[derive(Debug)]
pub struct ExtractedArtifact {
    pub name: String,
    pub files: Vec<PathBuf>,
    dir: TempDir,
}

impl ExtractedArtifact {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Reads artifacts of one workflow run
pub struct ArtifactCollector {
    transport: Arc<dyn Transport>,
    context: GithubContext,
    download_timeout: Duration,
    max_size: u64,
    temp_root: Option<PathBuf>,
}

impl ArtifactCollector {
    pub fn new(transport: Arc<dyn Transport>, context: GithubContext) -> Self {
        Self {
            transport,
            context: GithubContext {
                api_url: context.api_url.trim_end_matches('/').to_string(),
                ..context
            },
            download_timeout: DOWNLOAD_TIMEOUT,
            max_size: MAX_ARTIFACT_SIZE,
            temp_root: None,
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Create extraction directories under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn context(&self) -> &GithubContext {
        &self.context
    }

    fn github_request(&self, url: String) -> GhaResult<HttpRequest> {
        if self.context.token.is_empty() {
            return Err(GhaError::MissingToken);
        }
        Ok(HttpRequest::get(url)
            .header("Authorization", format!("Bearer {}", self.context.token))
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .header("User-Agent", vulnetix_protocol::USER_AGENT))
    }

    fn check_status(response: HttpResponse) -> GhaResult<HttpResponse> {
        if response.status == 200 {
            Ok(response)
        } else {
            Err(GhaError::GithubStatus {
                status: response.status,
                body: response.text(),
            })
        }
    }

    /// List the artifacts of the current run
    pub fn list_artifacts(&self, cancel: &CancelToken) -> GhaResult<Vec<GithubArtifact>> {
        cancel.check()?;
        let url = format!(
            "{}/repos/{}/actions/runs/{}/artifacts",
            self.context.api_url, self.context.repository, self.context.run_id
        );
        let request = self
            .github_request(url)?
            .timeout(LIST_TIMEOUT)
            .cancel(cancel.clone());

        let response = Self::check_status(self.transport.send(request)?)?;
        let parsed: ArtifactsResponse = serde_json::from_slice(&response.body)?;
        tracing::info!(count = parsed.artifacts.len(), run = %self.context.run_id, "listed artifacts");
        Ok(parsed.artifacts)
    }

    /// Download and extract one artifact
    ///
    /// Oversized artifacts are refused before any request. On failure the
    /// temporary directory is removed.
    pub fn download_artifact(&self, artifact: &GithubArtifact, cancel: &CancelToken) -> GhaResult<ExtractedArtifact> {
        if artifact.size_in_bytes > self.max_size {
            return Err(GhaError::TooLarge {
                size: artifact.size_in_bytes,
                max: self.max_size,
            });
        }
        cancel.check()?;

        let prefix = format!("artifact-{}-", sanitize_artifact_name(&artifact.name));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| GhaError::Io {
            path: PathBuf::from(&prefix),
            source,
        })?;

        let deadline = cancel.with_timeout(self.download_timeout);
        let request = self
            .github_request(artifact.archive_download_url.clone())?
            .timeout(self.download_timeout)
            .max_response_bytes(self.max_size)
            .cancel(deadline.clone());

        tracing::debug!(artifact = %artifact.name, size = artifact.size_in_bytes, "downloading artifact");
        let response = Self::check_status(self.transport.send(request)?)?;
        deadline.check()?;

        let files = extract_zip(Cursor::new(response.body), dir.path())?;
        tracing::info!(artifact = %artifact.name, files = files.len(), "artifact extracted");

        Ok(ExtractedArtifact {
            name: artifact.name.clone(),
            files,
            dir,
        })
    }
}
