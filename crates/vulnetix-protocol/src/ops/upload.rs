//! Chunked upload session types.
//!
//! initiate -> chunk(1..=n) -> finalize, plus the credential verify check.

use serde::{Deserialize, Serialize};

/// Initiate request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub total_chunks: u64,
    pub chunk_size: u64,
}

/// Initiate response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub upload_session_id: String,
    /// Session expiry as unix seconds, when the server reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Chunk response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub chunk_number: u64,
    #[serde(default)]
    pub received: u64,
    #[serde(default)]
    pub total_chunks: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Processing record the service creates for an uploaded artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRecord {
    pub uuid: String,
    #[serde(default)]
    pub detected_type: String,
    #[serde(default)]
    pub processing_state: String,
    #[serde(default)]
    pub original_file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Finalize response body.
///
/// `is_duplicate` is computed by the server; the client treats it as opaque.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_record: Option<PipelineRecord>,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /cli/verify` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate_request_uses_camel_case() {
        let req = InitiateRequest {
            file_name: "bom.cdx.json".to_string(),
            file_size: 12,
            content_type: "application/json".to_string(),
            total_chunks: 1,
            chunk_size: 12,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["fileName"], "bom.cdx.json");
        assert_eq!(value["totalChunks"], 1);
        assert_eq!(value["chunkSize"], 12);
    }

    #[test]
    fn test_finalize_duplicate_flag() {
        let json = r#"{"ok":true,"isDuplicate":true}"#;
        let resp: FinalizeResponse = serde_json::from_str(json).unwrap();
        assert!(resp.ok);
        assert!(resp.is_duplicate);
        assert!(resp.pipeline_record.is_none());
    }

    #[test]
    fn test_finalize_with_pipeline_record() {
        let json = r#"{"ok":true,"pipelineRecord":{"uuid":"p-1","detectedType":"cyclonedx","processingState":"queued","originalFileName":"a.json"}}"#;
        let resp: FinalizeResponse = serde_json::from_str(json).unwrap();
        let record = resp.pipeline_record.unwrap();
        assert_eq!(record.uuid, "p-1");
        assert_eq!(record.detected_type, "cyclonedx");
        assert!(!resp.is_duplicate);
    }
}
