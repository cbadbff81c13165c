//! Mock Service State Management
//!
//! Tracks upload sessions, artifact transactions and GitHub artifacts for
//! the mock service.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use vulnetix_protocol::ops::{ArtifactMetadata, GithubArtifact, InitiateRequest};

/// Chunked upload session as the mock server sees it
#[derive(Debug, Clone)]
pub struct MockUploadSession {
    pub session_id: String,
    pub declared: InitiateRequest,
    /// Byte length of each received chunk, in arrival order
    pub chunk_sizes: Vec<u64>,
    pub finalized: bool,
}

impl MockUploadSession {
    pub fn received_bytes(&self) -> u64 {
        self.chunk_sizes.iter().sum()
    }
}

/// One multipart artifact upload inside a transaction
#[derive(Debug, Clone)]
pub struct MockArtifactUpload {
    pub uuid: String,
    pub name: String,
    pub file_names: Vec<String>,
}

/// Artifact transaction as the mock server sees it
#[derive(Debug, Clone)]
pub struct MockTransaction {
    pub txn_id: String,
    pub org_id: String,
    pub meta: ArtifactMetadata,
    pub declared: Vec<String>,
    pub uploads: Vec<MockArtifactUpload>,
}

/// Artifact published by the mock GitHub API
#[derive(Debug, Clone)]
pub struct MockGithubArtifact {
    pub listing: GithubArtifact,
    pub archive: Vec<u8>,
}

/// Mutable state shared by all requests
#[derive(Debug, Default)]
pub struct MockState {
    pub sessions: HashMap<String, MockUploadSession>,
    pub transactions: HashMap<String, MockTransaction>,
    pub github_artifacts: Vec<MockGithubArtifact>,
    /// Expiry for issued tokens; defaults to 15 minutes from issue
    pub token_expiry: Option<DateTime<Utc>>,
    pub tokens_issued: u64,
    pub next_id: u64,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic id with a prefix, e.g. `session-1`
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    /// Find an artifact upload by uuid across all transactions
    pub fn artifact_upload(&self, uuid: &str) -> Option<(&MockTransaction, &MockArtifactUpload)> {
        self.transactions.values().find_map(|txn| {
            txn.uploads
                .iter()
                .find(|u| u.uuid == uuid)
                .map(|u| (txn, u))
        })
    }
}
