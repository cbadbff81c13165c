//! Credential store
//!
//! Resolution order, first match wins, no merging across sources:
//! 1. `VULNETIX_API_KEY` + `VULNETIX_ORG_ID` (static-header method)
//! 2. `VVD_ORG` + `VVD_SECRET` (signing method)
//! 3. Project file `.vulnetix/credentials.json`
//! 4. Home file `~/.vulnetix/credentials.json`

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::credentials::{CredentialError, CredentialResult, Credentials, StoreLocation};

/// Directory holding credential and config files, under home or project root
pub const CONFIG_DIR_NAME: &str = ".vulnetix";

/// Credential file name inside [`CONFIG_DIR_NAME`]
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

pub const ENV_API_KEY: &str = "VULNETIX_API_KEY";
pub const ENV_ORG_ID: &str = "VULNETIX_ORG_ID";
pub const ENV_SIGNING_ORG: &str = "VVD_ORG";
pub const ENV_SIGNING_SECRET: &str = "VVD_SECRET";

/// Environment lookup used during resolution
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Which source produced the resolved credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    EnvApiKey,
    EnvSigning,
    Project(PathBuf),
    Home(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::EnvApiKey => {
                write!(f, "environment ({} + {})", ENV_API_KEY, ENV_ORG_ID)
            }
            CredentialSource::EnvSigning => {
                write!(f, "environment ({} + {})", ENV_SIGNING_ORG, ENV_SIGNING_SECRET)
            }
            CredentialSource::Project(path) => write!(f, "project ({})", path.display()),
            CredentialSource::Home(path) => write!(f, "home ({})", path.display()),
        }
    }
}

/// Reads, writes and resolves credential records
#[derive(Clone)]
pub struct CredentialStore {
    env: EnvLookup,
    project_dir: PathBuf,
    home_dir: Option<PathBuf>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("project_dir", &self.project_dir)
            .field("home_dir", &self.home_dir)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Create a store with explicit environment and directories
    pub fn new(env: EnvLookup, project_dir: impl Into<PathBuf>, home_dir: Option<PathBuf>) -> Self {
        Self {
            env,
            project_dir: project_dir.into(),
            home_dir,
        }
    }

    /// Store backed by the process environment, `$HOME` and the current directory
    pub fn from_process() -> Self {
        let home_dir = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from);
        Self::new(Arc::new(|key| std::env::var(key).ok()), PathBuf::from("."), home_dir)
    }

    /// Path of the credential file for a location
    pub fn path_for(&self, location: StoreLocation) -> CredentialResult<PathBuf> {
        match location {
            StoreLocation::Project => Ok(self
                .project_dir
                .join(CONFIG_DIR_NAME)
                .join(CREDENTIALS_FILE_NAME)),
            StoreLocation::Home => self
                .home_dir
                .as_ref()
                .map(|home| home.join(CONFIG_DIR_NAME).join(CREDENTIALS_FILE_NAME))
                .ok_or(CredentialError::HomeDirUnavailable),
        }
    }

    fn env_pair(&self, first: &str, second: &str) -> Option<(String, String)> {
        let a = (self.env)(first).filter(|v| !v.is_empty())?;
        let b = (self.env)(second).filter(|v| !v.is_empty())?;
        Some((a, b))
    }

    /// Resolve credentials, trying each source in order
    pub fn resolve(&self) -> CredentialResult<(Credentials, CredentialSource)> {
        if let Some((api_key, org_id)) = self.env_pair(ENV_API_KEY, ENV_ORG_ID) {
            tracing::debug!(source = "env", method = "apikey", "resolved credentials");
            return Ok((Credentials::api_key(org_id, api_key), CredentialSource::EnvApiKey));
        }

        if let Some((org_id, secret)) = self.env_pair(ENV_SIGNING_ORG, ENV_SIGNING_SECRET) {
            tracing::debug!(source = "env", method = "sigv4", "resolved credentials");
            return Ok((Credentials::signing(org_id, secret), CredentialSource::EnvSigning));
        }

        for location in [StoreLocation::Project, StoreLocation::Home] {
            let path = match self.path_for(location) {
                Ok(p) => p,
                Err(_) => continue,
            };
            match self.load(location) {
                Ok(creds) => {
                    tracing::debug!(
                        source = location.as_str(),
                        method = creds.method().as_str(),
                        path = %path.display(),
                        "resolved credentials"
                    );
                    let source = match location {
                        StoreLocation::Project => CredentialSource::Project(path),
                        StoreLocation::Home => CredentialSource::Home(path),
                    };
                    return Ok((creds, source));
                }
                Err(CredentialError::Io { ref source, .. }) if source.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "skipping unusable credential file");
                }
            }
        }

        Err(CredentialError::NotFound)
    }

    /// Load credentials from one location, strictly
    pub fn load(&self, location: StoreLocation) -> CredentialResult<Credentials> {
        let path = self.path_for(location)?;
        let data = fs::read(&path).map_err(|source| CredentialError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|e| CredentialError::InvalidFormat {
            path,
            reason: e.to_string(),
        })
    }

    /// Persist credentials to a location with owner-only permissions
    pub fn save(&self, creds: &Credentials, location: StoreLocation) -> CredentialResult<PathBuf> {
        let path = self.path_for(location)?;
        if let Some(dir) = path.parent() {
            create_private_dir(dir).map_err(|source| CredentialError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let data = serde_json::to_vec_pretty(creds).map_err(|e| CredentialError::InvalidFormat {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        write_private_file(&path, &data).map_err(|source| CredentialError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(store = location.as_str(), path = %path.display(), "saved credentials");
        Ok(path)
    }

    /// Remove credentials from every file location
    ///
    /// Missing files are ignored; other failures are collected and reported together.
    pub fn remove(&self) -> CredentialResult<Vec<PathBuf>> {
        let mut removed = Vec::new();
        let mut failures = Vec::new();

        for location in [StoreLocation::Home, StoreLocation::Project] {
            let path = match self.path_for(location) {
                Ok(p) => p,
                Err(_) => continue,
            };
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("{}: {}", path.display(), e)),
            }
        }

        if failures.is_empty() {
            Ok(removed)
        } else {
            Err(CredentialError::RemoveFailed { failures })
        }
    }

    /// One-line description of the current authentication state
    pub fn status(&self) -> (String, Option<Credentials>) {
        match self.resolve() {
            Ok((creds, source)) => (
                format!(
                    "Authenticated via {} (method: {}, org: {})",
                    source,
                    creds.method(),
                    creds.org_id()
                ),
                Some(creds),
            ),
            Err(_) => ("Not authenticated".to_string(), None),
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    fs::write(path, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const ORG: &str = "11111111-1111-1111-1111-111111111111";

    fn env_from(pairs: &[(&str, &str)]) -> EnvLookup {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(move |key| map.get(key).cloned())
    }

    struct Fixture {
        _project: TempDir,
        _home: TempDir,
        store: CredentialStore,
    }

    fn fixture(pairs: &[(&str, &str)]) -> Fixture {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let store = CredentialStore::new(
            env_from(pairs),
            project.path(),
            Some(home.path().to_path_buf()),
        );
        Fixture {
            _project: project,
            _home: home,
            store,
        }
    }

    fn write_raw(store: &CredentialStore, location: StoreLocation, content: &str) {
        let path = store.path_for(location).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_env_api_key_wins() {
        let f = fixture(&[
            (ENV_API_KEY, "abc123"),
            (ENV_ORG_ID, ORG),
            (ENV_SIGNING_ORG, "other"),
            (ENV_SIGNING_SECRET, "s"),
        ]);
        f.store.save(&Credentials::signing(ORG, "file"), StoreLocation::Project).unwrap();

        let (creds, source) = f.store.resolve().unwrap();
        assert_eq!(source, CredentialSource::EnvApiKey);
        assert_eq!(creds, Credentials::api_key(ORG, "abc123"));
    }

    #[test]
    fn test_env_signing_pair() {
        let f = fixture(&[(ENV_SIGNING_ORG, ORG), (ENV_SIGNING_SECRET, "s3cr3t")]);
        let (creds, source) = f.store.resolve().unwrap();
        assert_eq!(source, CredentialSource::EnvSigning);
        assert_eq!(creds, Credentials::signing(ORG, "s3cr3t"));
    }

    #[test]
    fn test_incomplete_env_pair_is_ignored() {
        let f = fixture(&[(ENV_API_KEY, "abc123"), (ENV_ORG_ID, "")]);
        assert!(matches!(f.store.resolve(), Err(CredentialError::NotFound)));
    }

    #[test]
    fn test_project_file_scenario() {
        let f = fixture(&[]);
        write_raw(
            &f.store,
            StoreLocation::Project,
            &format!(r#"{{"org_id":"{}","secret":"s3cr3t-value","method":"sigv4"}}"#, ORG),
        );

        let (creds, source) = f.store.resolve().unwrap();
        assert!(matches!(source, CredentialSource::Project(_)));
        assert_eq!(creds.org_id(), ORG);
        assert_eq!(creds.method(), crate::auth::AuthMethod::SigV4);
        assert_eq!(creds, Credentials::signing(ORG, "s3cr3t-value"));
    }

    #[test]
    fn test_project_beats_home() {
        let f = fixture(&[]);
        f.store.save(&Credentials::api_key(ORG, "home-key"), StoreLocation::Home).unwrap();
        f.store.save(&Credentials::api_key(ORG, "project-key"), StoreLocation::Project).unwrap();

        let (creds, _) = f.store.resolve().unwrap();
        assert_eq!(creds, Credentials::api_key(ORG, "project-key"));
    }

    #[test]
    fn test_file_missing_org_id_falls_through() {
        let f = fixture(&[]);
        write_raw(&f.store, StoreLocation::Project, r#"{"api_key":"abc","method":"apikey"}"#);
        f.store.save(&Credentials::api_key(ORG, "home-key"), StoreLocation::Home).unwrap();

        let (creds, source) = f.store.resolve().unwrap();
        assert!(matches!(source, CredentialSource::Home(_)));
        assert_eq!(creds, Credentials::api_key(ORG, "home-key"));
    }

    #[test]
    fn test_strict_load_reports_missing_org_id() {
        let f = fixture(&[]);
        write_raw(&f.store, StoreLocation::Project, r#"{"api_key":"abc"}"#);
        let err = f.store.load(StoreLocation::Project).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidFormat { .. }));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_nothing_found() {
        let f = fixture(&[]);
        let err = f.store.resolve().unwrap_err();
        assert!(matches!(err, CredentialError::NotFound));
        assert!(err.to_string().contains("vulnetix auth login"));
    }

    #[test]
    fn test_round_trip_every_method_and_store() {
        let f = fixture(&[]);
        for location in [StoreLocation::Home, StoreLocation::Project] {
            for creds in [
                Credentials::api_key(ORG, "0123456789abcdef"),
                Credentials::signing(ORG, "s3cr3t/with+symbols="),
            ] {
                f.store.save(&creds, location).unwrap();
                assert_eq!(f.store.load(location).unwrap(), creds);
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_save_uses_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture(&[]);
        let path = f.store.save(&Credentials::api_key(ORG, "k"), StoreLocation::Home).unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn test_remove_clears_both_and_ignores_missing() {
        let f = fixture(&[]);
        f.store.save(&Credentials::api_key(ORG, "k"), StoreLocation::Home).unwrap();

        let removed = f.store.remove().unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!f.store.path_for(StoreLocation::Home).unwrap().exists());

        // Second call has nothing to remove and still succeeds
        assert!(f.store.remove().unwrap().is_empty());
    }

    #[test]
    fn test_home_unavailable() {
        let project = TempDir::new().unwrap();
        let store = CredentialStore::new(env_from(&[]), project.path(), None);
        assert!(matches!(
            store.save(&Credentials::api_key(ORG, "k"), StoreLocation::Home),
            Err(CredentialError::HomeDirUnavailable)
        ));
        assert!(matches!(store.resolve(), Err(CredentialError::NotFound)));
    }

    #[test]
    fn test_status_line() {
        let f = fixture(&[(ENV_API_KEY, "abc"), (ENV_ORG_ID, ORG)]);
        let (line, creds) = f.store.status();
        assert!(line.starts_with("Authenticated via environment (VULNETIX_API_KEY"));
        assert!(line.contains("method: apikey"));
        assert!(creds.is_some());

        let f = fixture(&[]);
        assert_eq!(f.store.status().0, "Not authenticated");
    }
}
