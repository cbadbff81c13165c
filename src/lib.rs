//! Vulnetix CLI
//!
//! Client library behind the `vulnetix` command: credential resolution,
//! the two authentication protocols, chunked artifact upload, the GitHub
//! Actions artifact transaction, and vulnerability database queries.

pub mod auth;
pub mod cancel;
pub mod client;
pub mod config;
pub mod gha;
pub mod logging;
pub mod mock;
pub mod upload;
pub mod vdb;

pub use auth::{AuthMethod, CredentialStore, Credentials, StoreLocation};
pub use cancel::{CancelToken, Interrupted};
pub use client::{ApiClient, ApiError, RateLimit, ReqwestTransport, Transport};
pub use config::{ConfigPaths, Settings};
pub use upload::UploadClient;
pub use vdb::VdbClient;
