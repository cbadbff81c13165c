//! In-process fake of the Vulnetix and GitHub APIs
//!
//! Implements [`Transport`] so clients can be driven end to end without a
//! network. Every request is recorded; failures are injected per route.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use vulnetix_protocol::ops::{
    ArtifactMetadata, ArtifactsResponse, GithubArtifact, InitiateRequest, TransactionRequest,
};

use crate::client::{HttpRequest, HttpResponse, RequestBody, Transport, TransportError};

use super::failure::{FailureConfig, FailureInjector};
use super::state::{
    MockArtifactUpload, MockGithubArtifact, MockState, MockTransaction, MockUploadSession,
};

/// Base URL of the mock GitHub API
pub const MOCK_GITHUB_API: &str = "https://github.test/api";

/// Endpoint family a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    AuthToken,
    CliVerify,
    UploadInitiate,
    UploadChunk,
    UploadFinalize,
    TransactionInitiate,
    TransactionUpload,
    TransactionStatus,
    ArtifactStatus,
    GithubListArtifacts,
    GithubDownload,
    /// Anything else, answered as a database query
    Vdb,
}

impl Route {
    /// Classify a URL by its path
    pub fn classify(url: &str) -> Self {
        let (path, _) = split_url(url);
        if path.ends_with("/auth/token") {
            Route::AuthToken
        } else if path.ends_with("/cli/verify") {
            Route::CliVerify
        } else if path.ends_with("/artifact-upload/initiate") {
            Route::UploadInitiate
        } else if path.contains("/artifact-upload/chunk/") {
            Route::UploadChunk
        } else if path.contains("/artifact-upload/finalize/") {
            Route::UploadFinalize
        } else if path.contains("/github/artifact/") && path.ends_with("/status") {
            Route::ArtifactStatus
        } else if path.contains("/github/artifact-upload/") && path.ends_with("/status") {
            Route::TransactionStatus
        } else if path.contains("/github/artifact-upload/") {
            Route::TransactionUpload
        } else if path.ends_with("/github/artifact-upload") {
            Route::TransactionInitiate
        } else if path.contains("/actions/runs/") && path.ends_with("/artifacts") {
            Route::GithubListArtifacts
        } else if path.contains("/actions/artifacts/") {
            Route::GithubDownload
        } else {
            Route::Vdb
        }
    }
}

/// Split a URL into its path and query string
fn split_url(url: &str) -> (&str, &str) {
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path_and_query = after_scheme
        .find('/')
        .map(|i| &after_scheme[i..])
        .unwrap_or("/");
    path_and_query.split_once('?').unwrap_or((path_and_query, ""))
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn json_response<T: Serialize>(status: u16, value: &T) -> HttpResponse {
    HttpResponse::new(status, serde_json::to_vec(value).unwrap_or_default())
        .with_header("Content-Type", "application/json")
}

fn error_response(status: u16, message: &str) -> HttpResponse {
    json_response(status, &json!({"success": false, "error": message}))
}

/// Configurable fake service for testing
#[derive(Default)]
pub struct MockService {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
    requests: Arc<Mutex<Vec<(Route, HttpRequest)>>>,
    response_headers: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    // --- configuration ---

    /// Inject a failure for a route
    pub fn inject(&self, route: Route, config: FailureConfig) {
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .inject(route, config);
    }

    /// Answer every call on `route` with `status` and `body`
    pub fn inject_status(&self, route: Route, status: u16, body: &str) {
        self.inject(route, FailureConfig::status(status, body));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    /// Headers added to every successful response
    pub fn set_response_headers(&self, headers: &[(&str, &str)]) {
        *self.response_headers.lock().unwrap_or_else(|p| p.into_inner()) = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
    }

    pub fn set_token_expiry(&self, expires_at: DateTime<Utc>) {
        self.state().token_expiry = Some(expires_at);
    }

    /// Publish an artifact whose listed size matches the archive
    pub fn add_github_artifact(&self, name: &str, archive: Vec<u8>) -> GithubArtifact {
        let size = archive.len() as u64;
        self.add_github_artifact_with_size(name, archive, size)
    }

    /// Publish an artifact with an explicit listed size
    pub fn add_github_artifact_with_size(&self, name: &str, archive: Vec<u8>, size_in_bytes: u64) -> GithubArtifact {
        let mut state = self.state();
        let id = state.github_artifacts.len() as i64 + 1;
        let listing = GithubArtifact {
            id,
            node_id: format!("MDg6QXJ0aWZhY3Q{}", id),
            name: name.to_string(),
            size_in_bytes,
            url: format!("{}/repos/acme/app/actions/artifacts/{}", MOCK_GITHUB_API, id),
            archive_download_url: format!("{}/repos/acme/app/actions/artifacts/{}/zip", MOCK_GITHUB_API, id),
            expired: false,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            expires_at: None,
        };
        state.github_artifacts.push(MockGithubArtifact {
            listing: listing.clone(),
            archive,
        });
        listing
    }

    // --- inspection ---

    /// Every request received, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn requests_for(&self, route: Route) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|(r, _)| *r == route)
            .map(|(_, req)| req.clone())
            .collect()
    }

    pub fn count(&self, route: Route) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|(r, _)| *r == route)
            .count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn session(&self, session_id: &str) -> Option<MockUploadSession> {
        self.state().sessions.get(session_id).cloned()
    }

    pub fn transaction(&self, txn_id: &str) -> Option<MockTransaction> {
        self.state().transactions.get(txn_id).cloned()
    }

    // --- handlers ---

    fn dispatch(&self, route: Route, request: &HttpRequest) -> HttpResponse {
        let (path, query) = split_url(&request.url);
        match route {
            Route::AuthToken => self.handle_token(request),
            Route::CliVerify => json_response(200, &json!({"ok": true, "orgId": "mock-org"})),
            Route::UploadInitiate => self.handle_initiate(request),
            Route::UploadChunk => self.handle_chunk(path, request),
            Route::UploadFinalize => self.handle_finalize(path),
            Route::TransactionInitiate => self.handle_transaction_initiate(path, request),
            Route::TransactionUpload => self.handle_artifact_upload(path, request),
            Route::TransactionStatus => self.handle_transaction_status(path),
            Route::ArtifactStatus => self.handle_artifact_status(path),
            Route::GithubListArtifacts => self.handle_github_list(request),
            Route::GithubDownload => self.handle_github_download(path, request),
            Route::Vdb => json_response(200, &json!({"path": path, "query": query})),
        }
    }

    fn handle_token(&self, request: &HttpRequest) -> HttpResponse {
        let signed = request
            .header_value("authorization")
            .map(|v| v.starts_with("AWS4-HMAC-SHA512 "))
            .unwrap_or(false);
        if !signed || request.header_value("x-amz-date").is_none() {
            return error_response(401, "missing signature");
        }

        let mut state = self.state();
        state.tokens_issued += 1;
        let exp = state
            .token_expiry
            .unwrap_or_else(|| Utc::now() + chrono::Duration::minutes(15));
        json_response(
            200,
            &json!({
                "token": format!("mock-token-{}", state.tokens_issued),
                "iss": "vulnetix",
                "sub": "mock-org",
                "exp": exp.timestamp(),
            }),
        )
    }

    fn handle_initiate(&self, request: &HttpRequest) -> HttpResponse {
        let declared: InitiateRequest = match &request.body {
            RequestBody::Json(data) => match serde_json::from_slice(data) {
                Ok(v) => v,
                Err(e) => return error_response(400, &e.to_string()),
            },
            _ => return error_response(400, "expected JSON body"),
        };
        if declared.total_chunks == 0 {
            return error_response(400, "totalChunks must be positive");
        }

        let mut state = self.state();
        let session_id = state.next_id("session");
        state.sessions.insert(
            session_id.clone(),
            MockUploadSession {
                session_id: session_id.clone(),
                declared,
                chunk_sizes: Vec::new(),
                finalized: false,
            },
        );
        json_response(
            200,
            &json!({
                "ok": true,
                "uploadSessionId": session_id,
                "expiresAt": (Utc::now() + chrono::Duration::hours(1)).timestamp(),
            }),
        )
    }

    fn handle_chunk(&self, path: &str, request: &HttpRequest) -> HttpResponse {
        let parts = segments(path);
        let (session_id, number) = match parts.as_slice() {
            [.., session, n] => (session.to_string(), n.parse::<u64>().unwrap_or(0)),
            _ => return error_response(404, "not found"),
        };
        let size = match &request.body {
            RequestBody::Bytes { data, .. } => data.len() as u64,
            _ => return error_response(400, "expected octet-stream body"),
        };

        let mut state = self.state();
        let session = match state.sessions.get_mut(&session_id) {
            Some(s) => s,
            None => return error_response(404, "unknown upload session"),
        };
        let expected = session.chunk_sizes.len() as u64 + 1;
        if session.finalized || number != expected || number > session.declared.total_chunks {
            return error_response(409, "chunk out of order");
        }
        session.chunk_sizes.push(size);
        json_response(
            200,
            &json!({
                "ok": true,
                "chunkNumber": number,
                "received": session.chunk_sizes.len(),
                "totalChunks": session.declared.total_chunks,
            }),
        )
    }

    fn handle_finalize(&self, path: &str) -> HttpResponse {
        let session_id = segments(path).last().map(|s| s.to_string()).unwrap_or_default();
        let mut state = self.state();
        let uuid = state.next_id("pipeline");
        let session = match state.sessions.get_mut(&session_id) {
            Some(s) => s,
            None => return error_response(404, "unknown upload session"),
        };
        if session.chunk_sizes.len() as u64 != session.declared.total_chunks
            || session.received_bytes() != session.declared.file_size
        {
            return json_response(400, &json!({"ok": false, "error": "incomplete upload"}));
        }
        session.finalized = true;
        json_response(
            200,
            &json!({
                "ok": true,
                "pipelineRecord": {
                    "uuid": uuid,
                    "detectedType": "unknown",
                    "processingState": "queued",
                    "originalFileName": session.declared.file_name,
                },
                "isDuplicate": false,
            }),
        )
    }

    fn handle_transaction_initiate(&self, path: &str, request: &HttpRequest) -> HttpResponse {
        let org_id = segments(path)
            .iter()
            .rev()
            .nth(2)
            .map(|s| s.to_string())
            .unwrap_or_default();
        let body: TransactionRequest = match &request.body {
            RequestBody::Json(data) => match serde_json::from_slice(data) {
                Ok(v) => v,
                Err(e) => return error_response(400, &e.to_string()),
            },
            _ => return error_response(400, "expected JSON body"),
        };

        let mut state = self.state();
        let txn_id = state.next_id("txn");
        state.transactions.insert(
            txn_id.clone(),
            MockTransaction {
                txn_id: txn_id.clone(),
                org_id,
                meta: body.meta,
                declared: body.artifacts,
                uploads: Vec::new(),
            },
        );
        json_response(200, &json!({"txnid": txn_id, "success": true}))
    }

    fn handle_artifact_upload(&self, path: &str, request: &HttpRequest) -> HttpResponse {
        let txn_id = segments(path).last().map(|s| s.to_string()).unwrap_or_default();
        let form = match &request.body {
            RequestBody::Multipart(form) => form,
            _ => return error_response(400, "expected multipart body"),
        };
        let name = form
            .fields
            .iter()
            .find(|(k, _)| k == "artifact_name")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let file_names: Vec<String> = form
            .files
            .iter()
            .filter(|f| f.field == "files")
            .map(|f| f.file_name.clone())
            .collect();
        if name.is_empty() || file_names.is_empty() {
            return error_response(400, "artifact_name and files are required");
        }

        let mut state = self.state();
        let uuid = state.next_id("artifact");
        let txn = match state.transactions.get_mut(&txn_id) {
            Some(t) => t,
            None => return error_response(404, "unknown transaction"),
        };
        txn.uploads.push(MockArtifactUpload {
            uuid: uuid.clone(),
            name,
            file_names,
        });
        json_response(
            200,
            &json!({"uuid": uuid, "queue_path": format!("queue/{}/{}", txn_id, uuid), "success": true}),
        )
    }

    fn handle_transaction_status(&self, path: &str) -> HttpResponse {
        let parts = segments(path);
        let txn_id = parts.iter().rev().nth(1).map(|s| s.to_string()).unwrap_or_default();
        let state = self.state();
        let txn = match state.transactions.get(&txn_id) {
            Some(t) => t,
            None => return error_response(404, "unknown transaction"),
        };
        let artifacts: Vec<_> = txn
            .uploads
            .iter()
            .map(|u| json!({"uuid": u.uuid, "name": u.name, "status": "queued"}))
            .collect();
        let status = if txn.uploads.len() == txn.declared.len() {
            "completed"
        } else {
            "pending"
        };
        json_response(200, &json!({"status": status, "txnid": txn.txn_id, "artifacts": artifacts}))
    }

    fn handle_artifact_status(&self, path: &str) -> HttpResponse {
        let parts = segments(path);
        let uuid = parts.iter().rev().nth(1).map(|s| s.to_string()).unwrap_or_default();
        let state = self.state();
        match state.artifact_upload(&uuid) {
            Some((txn, upload)) => json_response(
                200,
                &json!({
                    "status": "queued",
                    "txnid": txn.txn_id,
                    "artifacts": [{"uuid": upload.uuid, "name": upload.name, "status": "queued"}],
                }),
            ),
            None => error_response(404, "unknown artifact"),
        }
    }

    fn handle_github_list(&self, request: &HttpRequest) -> HttpResponse {
        if !request
            .header_value("authorization")
            .map(|v| v.starts_with("Bearer "))
            .unwrap_or(false)
        {
            return json_response(401, &json!({"message": "Bad credentials"}));
        }
        let state = self.state();
        let artifacts: Vec<GithubArtifact> = state
            .github_artifacts
            .iter()
            .map(|a| a.listing.clone())
            .collect();
        json_response(
            200,
            &ArtifactsResponse {
                total_count: artifacts.len() as u64,
                artifacts,
            },
        )
    }

    fn handle_github_download(&self, path: &str, request: &HttpRequest) -> HttpResponse {
        if request.header_value("authorization").is_none() {
            return json_response(401, &json!({"message": "Bad credentials"}));
        }
        let parts = segments(path);
        let id = parts
            .iter()
            .rev()
            .nth(1)
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);
        let state = self.state();
        match state.github_artifacts.iter().find(|a| a.listing.id == id) {
            Some(a) => HttpResponse::new(200, a.archive.clone())
                .with_header("Content-Type", "application/zip"),
            None => json_response(404, &json!({"message": "Not Found"})),
        }
    }
}

impl Transport for MockService {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let route = Route::classify(&request.url);
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((route, request.clone()));

        if let Some(token) = &request.cancel {
            token.check()?;
        }

        let injected = self
            .failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .check(route)
            .cloned();
        if let Some(config) = &injected {
            if let Some(delay) = config.delay {
                std::thread::sleep(delay);
            }
            if let Some(message) = &config.transport_error {
                return Err(TransportError::Connect(message.clone()));
            }
            if let Some(status) = config.status {
                let mut response = HttpResponse::new(status, config.body.clone());
                response.headers = config.headers.clone();
                return Ok(response);
            }
        }

        let mut response = self.dispatch(route, &request);
        if response.is_success() {
            response
                .headers
                .extend(self.response_headers.lock().unwrap_or_else(|p| p.into_inner()).iter().cloned());
        }

        if let Some(limit) = request.max_response_bytes {
            if response.body.len() as u64 > limit {
                return Err(TransportError::BodyTooLarge { limit });
            }
        }
        Ok(response)
    }
}

/// Metadata with just enough fields set for transaction tests
pub fn sample_metadata(artifacts: &[&str]) -> ArtifactMetadata {
    ArtifactMetadata {
        repository: "acme/app".to_string(),
        repository_owner: "acme".to_string(),
        run_id: "42".to_string(),
        run_number: "7".to_string(),
        workflow_name: "ci".to_string(),
        job_name: "build".to_string(),
        sha: "0123456789abcdef".to_string(),
        ref_name: "main".to_string(),
        ref_type: "branch".to_string(),
        event_name: "push".to_string(),
        actor: "octocat".to_string(),
        server_url: "https://github.com".to_string(),
        api_url: MOCK_GITHUB_API.to_string(),
        artifacts: artifacts.iter().map(|s| s.to_string()).collect(),
        extra_env_vars: None,
    }
}
