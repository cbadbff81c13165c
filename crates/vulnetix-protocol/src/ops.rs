//! Operation-specific types.

pub mod github;
pub mod token;
pub mod transaction;
pub mod upload;
pub mod vdb;

pub use github::{ArtifactsResponse, GithubArtifact};
pub use token::TokenResponse;
pub use transaction::{
    ArtifactMetadata, ArtifactStatusDetail, ArtifactUploadResponse, StatusResponse,
    TransactionRequest, TransactionResponse,
};
pub use upload::{
    ChunkResponse, FinalizeResponse, InitiateRequest, InitiateResponse, PipelineRecord,
    VerifyResponse,
};
pub use vdb::{Ecosystem, EcosystemsResponse};
