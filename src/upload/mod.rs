//! Chunked upload pipeline
//!
//! Three phases against the upload API:
//! 1. `POST /artifact-upload/initiate` declares name, size, type and chunking
//! 2. `POST /artifact-upload/chunk/{session}/{n}` for `n = 1..=total`, in order
//! 3. `POST /artifact-upload/finalize/{session}`
//!
//! Small files still go through all three phases as a single chunk. The first
//! failure aborts the upload; nothing is retried or resumed.

mod format;
mod plan;

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use vulnetix_protocol::ops::{
    ChunkResponse, FinalizeResponse, InitiateRequest, InitiateResponse, VerifyResponse,
};
use vulnetix_protocol::paths;

use crate::client::{validate_path_id, ApiClient, ApiError, Method, RequestBody};

pub use format::{content_type, detect_format, ArtifactFormat};
pub use plan::{ChunkPlan, UploadState, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD};

/// Upload phase an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initiate,
    Chunk { index: u64, total: u64 },
    Finalize,
    Verify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initiate => f.write_str("initiate"),
            Phase::Chunk { index, total } => write!(f, "chunk {}/{}", index, total),
            Phase::Finalize => f.write_str("finalize"),
            Phase::Verify => f.write_str("verify"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("upload {phase} failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: ApiError,
    },

    #[error("upload {phase} rejected: {message}")]
    Rejected { phase: Phase, message: String },
}

impl UploadError {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            UploadError::Io { .. } => None,
            UploadError::Phase { phase, .. } | UploadError::Rejected { phase, .. } => Some(*phase),
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            UploadError::Phase { source, .. } => source.hint(),
            UploadError::Io { .. } => Some("check that the file exists and is readable"),
            UploadError::Rejected { .. } => None,
        }
    }
}

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Result of a completed upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub file_name: String,
    pub format: ArtifactFormat,
    pub plan: ChunkPlan,
    pub session_id: String,
    pub state: UploadState,
    pub finalize: FinalizeResponse,
}

/// Client for the chunked upload API
pub struct UploadClient {
    api: ApiClient,
    chunk_threshold: u64,
    chunk_size: u64,
}

impl UploadClient {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunking(mut self, threshold: u64, chunk_size: u64) -> Self {
        self.chunk_threshold = threshold;
        self.chunk_size = chunk_size;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Upload one file through initiate, chunks and finalize
    pub fn upload_file(&self, path: &Path, format_override: Option<ArtifactFormat>) -> UploadResult<UploadOutcome> {
        let io_err = |source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let file_size = file.metadata().map_err(io_err)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let format = match format_override {
            Some(f) => f,
            None => {
                let mut head = Vec::with_capacity(2048);
                (&mut file).take(2048).read_to_end(&mut head).map_err(io_err)?;
                detect_format(path, &head)
            }
        };

        let plan = ChunkPlan::new(file_size, self.chunk_threshold, self.chunk_size);
        let content_type = content_type(&file_name);
        tracing::info!(
            file = %file_name,
            size = file_size,
            chunks = plan.total_chunks,
            %format,
            "starting upload"
        );

        let session_id = self.initiate(&file_name, content_type, &plan)?;
        let mut state = UploadState::Initiated {
            session_id: session_id.clone(),
        };

        while let Some(number) = state.next_chunk(&plan) {
            let range = plan.range(number).unwrap_or(0..0);
            let mut data = vec![0u8; (range.end - range.start) as usize];
            file.seek(SeekFrom::Start(range.start)).map_err(io_err)?;
            file.read_exact(&mut data).map_err(io_err)?;

            self.upload_chunk(&session_id, number, plan.total_chunks, data)?;
            state = state.chunk_sent(number);
        }

        if !state.can_finalize(&plan) {
            return Err(UploadError::Rejected {
                phase: Phase::Finalize,
                message: "not every chunk was sent".to_string(),
            });
        }
        let finalize = self.finalize(&session_id)?;
        let state = state.finalized(&plan);
        tracing::info!(
            file = %file_name,
            duplicate = finalize.is_duplicate,
            "upload finalized"
        );

        Ok(UploadOutcome {
            file_name,
            format,
            plan,
            session_id,
            state,
            finalize,
        })
    }

    /// Open an upload session and return its id
    pub fn initiate(&self, file_name: &str, content_type: &str, plan: &ChunkPlan) -> UploadResult<String> {
        let phase = Phase::Initiate;
        let request = InitiateRequest {
            file_name: file_name.to_string(),
            file_size: plan.file_size,
            content_type: content_type.to_string(),
            total_chunks: plan.total_chunks,
            chunk_size: plan.chunk_size,
        };
        let response: InitiateResponse = self
            .api
            .post_json(paths::UPLOAD_INITIATE, &request)
            .map_err(|source| UploadError::Phase { phase, source })?;

        if !response.ok {
            return Err(UploadError::Rejected {
                phase,
                message: response.error.unwrap_or_else(|| "initiate failed".to_string()),
            });
        }
        validate_path_id(&response.upload_session_id)
            .map_err(|source| UploadError::Phase { phase, source })?;

        tracing::debug!(session = %response.upload_session_id, "upload session opened");
        Ok(response.upload_session_id)
    }

    /// Send chunk `number` of `total`
    pub fn upload_chunk(&self, session_id: &str, number: u64, total: u64, data: Vec<u8>) -> UploadResult<ChunkResponse> {
        let phase = Phase::Chunk { index: number, total };
        let session_id =
            validate_path_id(session_id).map_err(|source| UploadError::Phase { phase, source })?;

        let len = data.len();
        let body = RequestBody::Bytes {
            content_type: "application/octet-stream".to_string(),
            data,
        };
        let response: ChunkResponse = self
            .api
            .request_json(Method::Post, &paths::upload_chunk(session_id, number), body)
            .map_err(|source| UploadError::Phase { phase, source })?;

        if !response.ok {
            return Err(UploadError::Rejected {
                phase,
                message: response.error.unwrap_or_else(|| "chunk rejected".to_string()),
            });
        }
        tracing::debug!(chunk = number, total, bytes = len, "chunk sent");
        Ok(response)
    }

    /// Complete the session
    pub fn finalize(&self, session_id: &str) -> UploadResult<FinalizeResponse> {
        let phase = Phase::Finalize;
        let session_id =
            validate_path_id(session_id).map_err(|source| UploadError::Phase { phase, source })?;

        let response: FinalizeResponse = self
            .api
            .post_json(&paths::upload_finalize(session_id), &serde_json::json!({}))
            .map_err(|source| UploadError::Phase { phase, source })?;

        if !response.ok {
            return Err(UploadError::Rejected {
                phase,
                message: response.error.unwrap_or_else(|| "finalize failed".to_string()),
            });
        }
        Ok(response)
    }

    /// Check that the credentials are accepted
    pub fn verify_auth(&self) -> UploadResult<VerifyResponse> {
        let phase = Phase::Verify;
        let response: VerifyResponse = self
            .api
            .get_json(paths::CLI_VERIFY)
            .map_err(|source| UploadError::Phase { phase, source })?;
        if !response.ok {
            return Err(UploadError::Rejected {
                phase,
                message: response.error.unwrap_or_else(|| "verification failed".to_string()),
            });
        }
        Ok(response)
    }
}
