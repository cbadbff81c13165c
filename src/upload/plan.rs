//! Chunk planning and client-side session state

use std::ops::Range;

/// Files below this size go up as a single chunk
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Chunk size for files at or above the threshold
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// How a file is split into numbered chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub file_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
}

impl ChunkPlan {
    /// Plan for `file_size` bytes
    ///
    /// Below `threshold` the whole file is one chunk whose declared size is
    /// the file size. An empty file still has one (empty) chunk.
    pub fn new(file_size: u64, threshold: u64, chunk_size: u64) -> Self {
        if file_size < threshold || chunk_size == 0 {
            return Self {
                file_size,
                chunk_size: file_size,
                total_chunks: 1,
            };
        }
        Self {
            file_size,
            chunk_size,
            total_chunks: file_size.div_ceil(chunk_size).max(1),
        }
    }

    /// Byte range of chunk `number` (1-based)
    pub fn range(&self, number: u64) -> Option<Range<u64>> {
        if number == 0 || number > self.total_chunks {
            return None;
        }
        let start = (number - 1) * self.chunk_size;
        let end = (number * self.chunk_size).min(self.file_size);
        Some(start..end.max(start))
    }

    /// Chunk numbers with their byte ranges, in upload order
    pub fn chunks(&self) -> impl Iterator<Item = (u64, Range<u64>)> + '_ {
        (1..=self.total_chunks).filter_map(move |n| self.range(n).map(|r| (n, r)))
    }
}

/// Client-side progress through one upload session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Initiated { session_id: String },
    ChunksSent { session_id: String, sent: u64 },
    Finalized { session_id: String },
}

impl UploadState {
    pub fn session_id(&self) -> &str {
        match self {
            UploadState::Initiated { session_id }
            | UploadState::ChunksSent { session_id, .. }
            | UploadState::Finalized { session_id } => session_id,
        }
    }

    /// Number of the next chunk to send, if chunks may still be sent
    pub fn next_chunk(&self, plan: &ChunkPlan) -> Option<u64> {
        match self {
            UploadState::Initiated { .. } => Some(1),
            UploadState::ChunksSent { sent, .. } if *sent < plan.total_chunks => Some(sent + 1),
            _ => None,
        }
    }

    /// Record a chunk as sent
    pub fn chunk_sent(self, number: u64) -> Self {
        match self {
            UploadState::Initiated { session_id } | UploadState::ChunksSent { session_id, .. } => {
                UploadState::ChunksSent { session_id, sent: number }
            }
            other => other,
        }
    }

    /// Finalize is only valid once every chunk has been sent
    pub fn can_finalize(&self, plan: &ChunkPlan) -> bool {
        matches!(self, UploadState::ChunksSent { sent, .. } if *sent == plan.total_chunks)
    }

    /// Record a successful finalize; ignored unless finalize was allowed
    pub fn finalized(self, plan: &ChunkPlan) -> Self {
        if self.can_finalize(plan) {
            UploadState::Finalized {
                session_id: self.session_id().to_string(),
            }
        } else {
            self
        }
    }
}
