//! GitHub Actions artifact transaction types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata about the workflow run that produced a batch of artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub repository: String,
    pub repository_owner: String,
    pub run_id: String,
    pub run_number: String,
    pub workflow_name: String,
    #[serde(rename = "job")]
    pub job_name: String,
    pub sha: String,
    pub ref_name: String,
    pub ref_type: String,
    pub event_name: String,
    pub actor: String,
    pub server_url: String,
    pub api_url: String,
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_env_vars: Option<BTreeMap<String, String>>,
}

/// Body of `POST /{org}/github/artifact-upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    #[serde(rename = "_meta")]
    pub meta: ArtifactMetadata,
    pub artifacts: Vec<String>,
}

/// Response of transaction creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionResponse {
    #[serde(rename = "txnid", default)]
    pub txn_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response of a single artifact upload within a transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactUploadResponse {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub queue_path: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Status of a transaction or of a single artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(rename = "txnid", default, skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactStatusDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Per-artifact status line inside a [`StatusResponse`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactStatusDetail {
    pub uuid: String,
    pub name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_request_wire_names() {
        let request = TransactionRequest {
            meta: ArtifactMetadata {
                repository: "acme/app".to_string(),
                job_name: "build".to_string(),
                artifacts: vec!["sbom".to_string()],
                ..Default::default()
            },
            artifacts: vec!["sbom".to_string()],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["_meta"]["repository"], "acme/app");
        assert_eq!(value["_meta"]["job"], "build");
        assert!(value["_meta"].get("extra_env_vars").is_none());
        assert_eq!(value["artifacts"][0], "sbom");
    }

    #[test]
    fn test_status_response_parse() {
        let json = r#"{
            "status": "processing",
            "txnid": "txn-1",
            "artifacts": [{"uuid": "a-1", "name": "sbom", "status": "queued", "queue_path": "q/1"}],
            "details": {"attempt": 1}
        }"#;
        let resp: StatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "processing");
        assert_eq!(resp.txn_id.as_deref(), Some("txn-1"));
        assert_eq!(resp.artifacts.len(), 1);
        assert_eq!(resp.artifacts[0].queue_path.as_deref(), Some("q/1"));
        assert_eq!(resp.details.unwrap()["attempt"], 1);
    }
}
