//! End-to-end chunked upload against the in-process service

use std::sync::Arc;

use tempfile::TempDir;

use vulnetix::auth::Credentials;
use vulnetix::client::ApiClient;
use vulnetix::mock::{FailureConfig, MockService, Route};
use vulnetix::upload::{ArtifactFormat, Phase, UploadClient, UploadError};

const ORG: &str = "22222222-2222-2222-2222-222222222222";

fn signing_client(service: &Arc<MockService>) -> UploadClient {
    let api = ApiClient::new(service.clone(), "https://app.test/api", Credentials::signing(ORG, "s3cr3t"))
        .with_token_url("https://vdb.test/v1");
    UploadClient::new(api).with_chunking(1024, 400)
}

fn sarif_file(dir: &TempDir, len: usize) -> std::path::PathBuf {
    let path = dir.path().join("scan.sarif");
    std::fs::write(&path, vec![b'x'; len]).unwrap();
    path
}

#[test]
fn test_signed_upload_reuses_one_token() {
    let dir = TempDir::new().unwrap();
    let path = sarif_file(&dir, 1500);
    let service = Arc::new(MockService::new());

    let outcome = signing_client(&service).upload_file(&path, None).unwrap();
    assert_eq!(outcome.format, ArtifactFormat::Sarif);
    assert_eq!(outcome.plan.total_chunks, 4);

    let session = service.session(&outcome.session_id).unwrap();
    assert!(session.finalized);
    assert_eq!(session.chunk_sizes, vec![400, 400, 400, 300]);
    assert_eq!(session.received_bytes(), 1500);

    assert_eq!(service.count(Route::AuthToken), 1);
    let api_calls: Vec<_> = service
        .requests()
        .into_iter()
        .filter(|r| !r.url.ends_with("/auth/token"))
        .collect();
    assert_eq!(api_calls.len(), 6);
    for request in api_calls {
        assert_eq!(request.header_value("authorization"), Some("Bearer mock-token-1"));
    }
}

#[test]
fn test_file_below_threshold_is_one_chunk() {
    let dir = TempDir::new().unwrap();
    let path = sarif_file(&dir, 1000);
    let service = Arc::new(MockService::new());

    let outcome = signing_client(&service).upload_file(&path, None).unwrap();
    assert_eq!(outcome.plan.total_chunks, 1);
    assert_eq!(service.count(Route::UploadChunk), 1);
    assert_eq!(service.count(Route::UploadFinalize), 1);
}

#[test]
fn test_failed_chunk_stops_before_finalize() {
    let dir = TempDir::new().unwrap();
    let path = sarif_file(&dir, 1500);
    let service = Arc::new(MockService::new());
    service.inject(
        Route::UploadChunk,
        FailureConfig::status(503, r#"{"error":"storage unavailable"}"#).after(2),
    );

    let err = signing_client(&service).upload_file(&path, None).unwrap_err();
    assert_eq!(err.phase(), Some(Phase::Chunk { index: 3, total: 4 }));
    assert!(matches!(err, UploadError::Phase { .. }));
    assert!(err.to_string().contains("storage unavailable"));
    assert_eq!(service.count(Route::UploadChunk), 3);
    assert_eq!(service.count(Route::UploadFinalize), 0);
}

#[test]
fn test_rate_limit_headers_are_recorded() {
    let dir = TempDir::new().unwrap();
    let path = sarif_file(&dir, 10);
    let service = Arc::new(MockService::new());
    service.set_response_headers(&[("RateLimit-Remaining", "45")]);

    let client = signing_client(&service);
    client.upload_file(&path, None).unwrap();

    let rate = client.api().last_rate_limit().unwrap();
    assert!(rate.present);
    assert_eq!(rate.remaining, 45);
    assert_eq!(rate.minute_limit, 0);
    assert_eq!(rate.week_limit, 0);
}
