//! GitHub Actions artifacts API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One artifact of a workflow run, as listed by GitHub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubArtifact {
    pub id: i64,
    #[serde(default)]
    pub node_id: String,
    pub name: String,
    pub size_in_bytes: u64,
    #[serde(default)]
    pub url: String,
    pub archive_download_url: String,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// `GET /repos/{repo}/actions/runs/{run}/artifacts` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsResponse {
    pub total_count: u64,
    pub artifacts: Vec<GithubArtifact>,
}
