//! Credential resolution against the real process environment
//!
//! These tests change `HOME`, the working directory and the credential
//! variables, so they run serially.

use std::env;
use std::fs;
use std::path::Path;

use serial_test::serial;
use tempfile::TempDir;

use vulnetix::auth::{
    AuthMethod, CredentialError, CredentialSource, CredentialStore, Credentials, StoreLocation,
    ENV_API_KEY, ENV_ORG_ID, ENV_SIGNING_ORG, ENV_SIGNING_SECRET,
};

const ORG: &str = "11111111-1111-1111-1111-111111111111";

/// Run `f` with HOME and cwd pointed at fresh temp dirs and no credential env
fn with_sandbox<F: FnOnce(&Path, &Path)>(f: F) {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let saved_home = env::var_os("HOME");
    let saved_cwd = env::current_dir().unwrap();
    let vars = [ENV_API_KEY, ENV_ORG_ID, ENV_SIGNING_ORG, ENV_SIGNING_SECRET];
    let saved_vars: Vec<_> = vars.iter().map(|k| (*k, env::var_os(k))).collect();

    for key in vars {
        env::remove_var(key);
    }
    env::set_var("HOME", home.path());
    env::set_current_dir(project.path()).unwrap();

    f(home.path(), project.path());

    env::set_current_dir(saved_cwd).unwrap();
    match saved_home {
        Some(h) => env::set_var("HOME", h),
        None => env::remove_var("HOME"),
    }
    for (key, value) in saved_vars {
        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }
}

#[test]
#[serial]
fn test_nothing_configured() {
    with_sandbox(|_, _| {
        let err = CredentialStore::from_process().resolve().unwrap_err();
        assert!(matches!(err, CredentialError::NotFound));
        assert!(err.hint().is_some());
    });
}

#[test]
#[serial]
fn test_project_file_without_env_or_home() {
    with_sandbox(|_, project| {
        let dir = project.join(".vulnetix");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("credentials.json"),
            format!(r#"{{"org_id":"{}","api_key":"proj-key","method":"apikey"}}"#, ORG),
        )
        .unwrap();

        let (creds, source) = CredentialStore::from_process().resolve().unwrap();
        assert_eq!(creds.method(), AuthMethod::ApiKey);
        assert_eq!(creds.org_id(), ORG);
        assert!(matches!(source, CredentialSource::Project(_)));
    });
}

#[test]
#[serial]
fn test_env_overrides_files() {
    with_sandbox(|_, _| {
        let store = CredentialStore::from_process();
        store
            .save(&Credentials::api_key(ORG, "file-key"), StoreLocation::Home)
            .unwrap();

        env::set_var(ENV_SIGNING_ORG, ORG);
        env::set_var(ENV_SIGNING_SECRET, "env-secret");
        let (creds, source) = CredentialStore::from_process().resolve().unwrap();
        assert_eq!(creds.method(), AuthMethod::SigV4);
        assert_eq!(source, CredentialSource::EnvSigning);
    });
}

#[test]
#[serial]
fn test_login_logout_cycle() {
    with_sandbox(|home, project| {
        let store = CredentialStore::from_process();
        let home_path = store
            .save(&Credentials::signing(ORG, "s3cr3t"), StoreLocation::Home)
            .unwrap();
        let project_path = store
            .save(&Credentials::api_key(ORG, "k"), StoreLocation::Project)
            .unwrap();
        assert!(home_path.starts_with(home));
        assert!(project_path.ends_with(".vulnetix/credentials.json"));
        assert!(project.join(".vulnetix/credentials.json").exists());

        // Project file wins over home
        let (creds, _) = store.resolve().unwrap();
        assert_eq!(creds.method(), AuthMethod::ApiKey);

        let removed = store.remove().unwrap();
        assert_eq!(removed.len(), 2);
        assert!(matches!(store.resolve(), Err(CredentialError::NotFound)));
    });
}
