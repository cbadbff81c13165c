//! GitHub Actions artifact transaction, end to end against the fake service

use std::io::{Cursor, Write};
use std::sync::Arc;

use tempfile::TempDir;

use vulnetix::auth::Credentials;
use vulnetix::cancel::CancelToken;
use vulnetix::client::ApiClient;
use vulnetix::gha::{
    collect_metadata, ArtifactCollector, ArtifactOutcome, ArtifactUploader, FailureStage, GhaError,
    GithubContext, TransactionState,
};
use vulnetix::mock::{MockService, Route, MOCK_GITHUB_API};

const ORG: &str = "33333333-3333-3333-3333-333333333333";

fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn run_env(key: &str) -> Option<String> {
    let value = match key {
        "GITHUB_TOKEN" => "ghs_test",
        "GITHUB_API_URL" => MOCK_GITHUB_API,
        "GITHUB_REPOSITORY" => "acme/app",
        "GITHUB_REPOSITORY_OWNER" => "acme",
        "GITHUB_RUN_ID" => "42",
        "GITHUB_SHA" => "0123456789abcdef",
        "GITHUB_WORKFLOW" => "security",
        "RUNNER_OS" => "Linux",
        _ => return None,
    };
    Some(value.to_string())
}

struct Fixture {
    service: Arc<MockService>,
    collector: ArtifactCollector,
    uploader: ArtifactUploader,
    temp_root: TempDir,
}

fn fixture() -> Fixture {
    let service = Arc::new(MockService::new());
    let temp_root = TempDir::new().unwrap();
    let context = GithubContext::from_env(run_env, None).unwrap();
    let collector = ArtifactCollector::new(service.clone(), context).with_temp_root(temp_root.path());
    let api = ApiClient::new(service.clone(), "https://gha.test", Credentials::api_key(ORG, "key"));
    Fixture {
        uploader: ArtifactUploader::new(api, ORG),
        service,
        collector,
        temp_root,
    }
}

#[test]
fn test_full_transaction() {
    let fx = fixture();
    fx.service.add_github_artifact(
        "sbom",
        zip_with(&[("bom.cdx.json", b"{}"), ("deps/lock.json", b"{}")]),
    );
    fx.service.add_github_artifact("sarif", zip_with(&[("scan.sarif", b"{}")]));

    let cancel = CancelToken::new();
    let artifacts = fx.collector.list_artifacts(&cancel).unwrap();
    let names: Vec<String> = artifacts.iter().map(|a| a.name.clone()).collect();
    let meta = collect_metadata(run_env, &names);

    let report = fx
        .uploader
        .run_transaction(&fx.collector, &meta, &artifacts, &cancel)
        .unwrap();
    assert_eq!(report.state(), TransactionState::Completed);
    assert_eq!(report.uploaded(), 2);

    let txn = fx.service.transaction(&report.txn_id).unwrap();
    assert_eq!(txn.org_id, ORG);
    assert_eq!(txn.declared, names);
    assert_eq!(txn.meta.repository, "acme/app");
    assert_eq!(txn.meta.workflow_name, "security");
    assert_eq!(
        txn.meta.extra_env_vars.as_ref().and_then(|m| m.get("RUNNER_OS")).map(String::as_str),
        Some("Linux")
    );
    assert_eq!(
        txn.uploads[0].file_names,
        vec!["bom.cdx.json".to_string(), "deps/lock.json".to_string()]
    );

    let status = fx.uploader.transaction_status(&report.txn_id).unwrap();
    assert_eq!(status.status, "completed");
    assert_eq!(status.artifacts.len(), 2);

    // Extraction dirs are gone once the transaction finishes
    assert_eq!(std::fs::read_dir(fx.temp_root.path()).unwrap().count(), 0);
}

#[test]
fn test_zip_slip_artifact_fails_alone() {
    let fx = fixture();
    fx.service
        .add_github_artifact("evil", zip_with(&[("ok.txt", b"fine"), ("../../etc/passwd", b"root")]));
    fx.service.add_github_artifact("sbom", zip_with(&[("bom.cdx.json", b"{}")]));

    let cancel = CancelToken::new();
    let artifacts = fx.collector.list_artifacts(&cancel).unwrap();
    let meta = collect_metadata(run_env, &[]);
    let report = fx
        .uploader
        .run_transaction(&fx.collector, &meta, &artifacts, &cancel)
        .unwrap();

    assert_eq!(report.state(), TransactionState::PartiallyFailed);
    assert_eq!(report.uploaded(), 1);
    match &report.outcomes[0] {
        (name, ArtifactOutcome::Failed { stage, error }) => {
            assert_eq!(name, "evil");
            assert_eq!(*stage, FailureStage::Download);
            assert!(error.contains("../../etc/passwd"), "{}", error);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(matches!(report.outcomes[1].1, ArtifactOutcome::Uploaded { .. }));

    // Nothing escaped the temp root
    let parent = fx.temp_root.path().parent().unwrap();
    assert!(!parent.join("etc").exists());
    assert_eq!(std::fs::read_dir(fx.temp_root.path()).unwrap().count(), 0);
    assert_eq!(fx.service.count(Route::TransactionUpload), 1);
}

#[test]
fn test_cancelled_transaction_aborts() {
    let fx = fixture();
    fx.service.add_github_artifact("sbom", zip_with(&[("bom.cdx.json", b"{}")]));

    let cancel = CancelToken::new();
    let artifacts = fx.collector.list_artifacts(&cancel).unwrap();
    cancel.cancel();

    let err = fx
        .uploader
        .run_transaction(&fx.collector, &collect_metadata(run_env, &[]), &artifacts, &cancel)
        .unwrap_err();
    assert!(err.is_interrupted());
    assert!(matches!(err, GhaError::Interrupted(_)));
    assert_eq!(fx.service.count(Route::GithubDownload), 0);
    assert_eq!(fx.service.count(Route::TransactionUpload), 0);
}

#[test]
fn test_missing_github_token() {
    let env = |key: &str| if key == "GITHUB_TOKEN" { None } else { run_env(key) };
    assert!(matches!(
        GithubContext::from_env(env, None),
        Err(GhaError::MissingToken)
    ));
}
