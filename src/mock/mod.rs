//! Mock Vulnetix Service
//!
//! In-process fake of the remote APIs the CLI talks to, for tests.
//!
//! # Routes
//!
//! - `auth/token`: issues bearer tokens for signed requests
//! - `artifact-upload/*`: chunked upload sessions, enforcing chunk order and size
//! - `{org}/github/*`: artifact transactions and status
//! - GitHub `actions/*`: artifact listing and archive download
//! - anything else: echoes the database query path

mod failure;
mod service;
mod state;

pub use failure::{FailureConfig, FailureInjector};
pub use service::{sample_metadata, MockService, Route, MOCK_GITHUB_API};
pub use state::{MockArtifactUpload, MockGithubArtifact, MockState, MockTransaction, MockUploadSession};
