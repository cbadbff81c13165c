//! Artifact transactions against the Vulnetix GitHub integration API

use std::fmt;
use std::path::Path;

use walkdir::WalkDir;

use vulnetix_protocol::ops::{
    ArtifactMetadata, ArtifactUploadResponse, GithubArtifact, StatusResponse, TransactionRequest,
    TransactionResponse,
};
use vulnetix_protocol::paths;

use crate::cancel::CancelToken;
use crate::client::{validate_path_id, ApiClient, Method, MultipartForm, RequestBody};

use super::collector::ArtifactCollector;
use super::{GhaError, GhaResult};

/// Where a per-artifact failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Download,
    Upload,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Download => f.write_str("download"),
            FailureStage::Upload => f.write_str("upload"),
        }
    }
}

/// Result for one artifact of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Uploaded { uuid: String, queue_path: String },
    Failed { stage: FailureStage, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Every artifact uploaded
    Completed,
    /// At least one artifact failed
    PartiallyFailed,
}

/// Per-artifact results of one transaction
#[derive(Debug, Clone)]
pub struct TransactionReport {
    pub txn_id: String,
    pub outcomes: Vec<(String, ArtifactOutcome)>,
}

impl TransactionReport {
    pub fn state(&self) -> TransactionState {
        if self
            .outcomes
            .iter()
            .all(|(_, o)| matches!(o, ArtifactOutcome::Uploaded { .. }))
        {
            TransactionState::Completed
        } else {
            TransactionState::PartiallyFailed
        }
    }

    pub fn uploaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ArtifactOutcome::Uploaded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.uploaded()
    }
}

/// Org-scoped client for artifact transactions
pub struct ArtifactUploader {
    api: ApiClient,
    org_id: String,
}

impl ArtifactUploader {
    pub fn new(api: ApiClient, org_id: impl Into<String>) -> Self {
        Self {
            api,
            org_id: org_id.into(),
        }
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    fn validate_txn(txn_id: &str) -> GhaResult<&str> {
        validate_path_id(txn_id).map_err(GhaError::InvalidTransactionId)
    }

    /// Open a transaction declaring the artifacts to follow
    pub fn initiate_transaction(&self, metadata: &ArtifactMetadata, names: &[String]) -> GhaResult<TransactionResponse> {
        let request = TransactionRequest {
            meta: metadata.clone(),
            artifacts: names.to_vec(),
        };
        let response: TransactionResponse = self
            .api
            .post_json(&paths::transaction_initiate(&self.org_id), &request)?;

        if !response.success {
            return Err(GhaError::Rejected {
                operation: "transaction initiation",
                message: response.message.unwrap_or_default(),
            });
        }
        Self::validate_txn(&response.txn_id)?;
        tracing::info!(txn = %response.txn_id, artifacts = names.len(), "transaction initiated");
        Ok(response)
    }

    /// Upload every regular file under `dir` as artifact `name`
    pub fn upload_artifact(&self, txn_id: &str, name: &str, dir: &Path) -> GhaResult<ArtifactUploadResponse> {
        self.send_artifact(txn_id, name, dir, None)
    }

    fn send_artifact(
        &self,
        txn_id: &str,
        name: &str,
        dir: &Path,
        cancel: Option<&CancelToken>,
    ) -> GhaResult<ArtifactUploadResponse> {
        let txn_id = Self::validate_txn(txn_id)?;

        let mut form = MultipartForm::new().text("artifact_name", name);
        let mut count = 0usize;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|source| GhaError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let size = entry
                .metadata()
                .map_err(|source| GhaError::Walk {
                    path: entry.path().to_path_buf(),
                    source,
                })?
                .len();
            form = form.file("files", relative, entry.path(), size);
            count += 1;
        }
        if count == 0 {
            return Err(GhaError::NoFiles(dir.to_path_buf()));
        }

        tracing::debug!(txn = %txn_id, artifact = %name, files = count, "uploading artifact");
        let mut request = self.api.prepare(
            Method::Post,
            &paths::transaction_upload(&self.org_id, txn_id),
            RequestBody::Multipart(form),
        )?;
        if let Some(token) = cancel {
            request = request.cancel(token.clone());
        }
        let response: ArtifactUploadResponse = serde_json::from_slice(&self.api.execute(request)?)?;

        if !response.success {
            return Err(GhaError::Rejected {
                operation: "artifact upload",
                message: response.message.unwrap_or_default(),
            });
        }
        Ok(response)
    }

    pub fn transaction_status(&self, txn_id: &str) -> GhaResult<StatusResponse> {
        let txn_id = Self::validate_txn(txn_id)?;
        Ok(self
            .api
            .get_json(&paths::transaction_status(&self.org_id, txn_id))?)
    }

    pub fn artifact_status(&self, artifact_uuid: &str) -> GhaResult<StatusResponse> {
        if artifact_uuid.is_empty() {
            return Err(GhaError::EmptyArtifactUuid);
        }
        Ok(self
            .api
            .get_json(&paths::artifact_status(&self.org_id, artifact_uuid))?)
    }

    /// Initiate one transaction and push every artifact through it
    ///
    /// A failing artifact is recorded and the batch continues. Cancellation
    /// and a failed initiation end the run with an error.
    pub fn run_transaction(
        &self,
        collector: &ArtifactCollector,
        metadata: &ArtifactMetadata,
        artifacts: &[GithubArtifact],
        cancel: &CancelToken,
    ) -> GhaResult<TransactionReport> {
        let names: Vec<String> = artifacts.iter().map(|a| a.name.clone()).collect();
        let txn = self.initiate_transaction(metadata, &names)?;

        let mut report = TransactionReport {
            txn_id: txn.txn_id.clone(),
            outcomes: Vec::with_capacity(artifacts.len()),
        };

        for artifact in artifacts {
            cancel.check()?;

            let extracted = match collector.download_artifact(artifact, cancel) {
                Ok(e) => e,
                Err(e) if e.is_interrupted() => return Err(e),
                Err(e) => {
                    tracing::warn!(artifact = %artifact.name, error = %e, "download failed");
                    report.outcomes.push((
                        artifact.name.clone(),
                        ArtifactOutcome::Failed {
                            stage: FailureStage::Download,
                            error: e.to_string(),
                        },
                    ));
                    continue;
                }
            };

            let outcome = match self.send_artifact(&txn.txn_id, &artifact.name, extracted.path(), Some(cancel)) {
                Ok(resp) => {
                    tracing::info!(artifact = %artifact.name, uuid = %resp.uuid, "artifact uploaded");
                    ArtifactOutcome::Uploaded {
                        uuid: resp.uuid,
                        queue_path: resp.queue_path,
                    }
                }
                Err(e) if e.is_interrupted() => return Err(e),
                Err(e) => {
                    tracing::warn!(artifact = %artifact.name, error = %e, "upload failed");
                    ArtifactOutcome::Failed {
                        stage: FailureStage::Upload,
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push((artifact.name.clone(), outcome));
        }

        tracing::info!(
            txn = %report.txn_id,
            uploaded = report.uploaded(),
            failed = report.failed(),
            "transaction finished"
        );
        Ok(report)
    }
}
