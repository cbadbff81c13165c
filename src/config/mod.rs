//! Layered configuration
//!
//! Four layers, later ones win:
//! 1. Built-in defaults
//! 2. User file (`~/.vulnetix/config.toml`)
//! 3. Project file (`.vulnetix/config.toml`), or the file given with `--config`
//! 4. CLI flags

mod defaults;
mod merge;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub use merge::{deep_merge, merge_layers, toml_to_json};

use crate::auth::CONFIG_DIR_NAME;
use crate::logging::LogFormat;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConfigError::Parse { .. } | ConfigError::Schema(_) => {
                Some("check the TOML syntax and key names in your config file")
            }
            ConfigError::Invalid { .. } => Some("fix the value in config.toml or on the command line"),
            ConfigError::Io { .. } => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ApiSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VdbSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GhaSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GithubSettings {
    /// Used when `GITHUB_API_URL` is unset
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HttpSettings {
    /// Token exchange, verify and database queries
    pub timeout_seconds: u64,
    pub upload_timeout_seconds: u64,
    pub transaction_timeout_seconds: u64,
    pub download_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct UploadSettings {
    pub chunk_threshold_bytes: u64,
    pub chunk_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

/// Fully merged settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api: ApiSettings,
    pub vdb: VdbSettings,
    pub gha: GhaSettings,
    pub github: GithubSettings,
    pub http: HttpSettings,
    pub upload: UploadSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// SHA-256 of the raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Where to look for config files
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub user: Option<PathBuf>,
    pub project: Option<PathBuf>,
    /// Replaces the project file and must exist
    pub explicit: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard locations under `$HOME` and `project_dir`
    pub fn discover(home_dir: Option<&Path>, project_dir: &Path, explicit: Option<PathBuf>) -> Self {
        Self {
            user: home_dir.map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)),
            project: Some(project_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)),
            explicit,
        }
    }
}

/// Settings plus the layers they came from
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub sources: Vec<ConfigSource>,
}

impl LoadedSettings {
    /// Contributing layers in precedence order, e.g. `builtin, user (/home/a/.vulnetix/config.toml), cli`
    pub fn summary(&self) -> String {
        self.sources
            .iter()
            .map(|source| {
                let origin = match source.origin {
                    ConfigOrigin::Builtin => "builtin",
                    ConfigOrigin::User => "user",
                    ConfigOrigin::Project => "project",
                    ConfigOrigin::Cli => "cli",
                };
                match &source.path {
                    Some(path) => format!("{} ({})", origin, path.display()),
                    None => origin.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Settings {
    /// Merge every layer, deserialize, and validate
    pub fn load(paths: &ConfigPaths, cli_overrides: Option<Value>) -> ConfigResult<LoadedSettings> {
        let mut layers = vec![serde_json::to_value(Settings::default())?];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = paths.user.as_deref().filter(|p| p.exists()) {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::User,
                path: Some(path.to_path_buf()),
                digest: Some(digest),
            });
        }

        let project = match &paths.explicit {
            Some(path) => Some(path.as_path()),
            None => paths.project.as_deref().filter(|p| p.exists()),
        };
        if let Some(path) = project {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Project,
                path: Some(path.to_path_buf()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let settings: Settings = serde_json::from_value(merge_layers(layers))?;
        settings.validate()?;
        Ok(LoadedSettings { settings, sources })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_url("api.base_url", &self.api.base_url)?;
        check_url("vdb.base_url", &self.vdb.base_url)?;
        check_url("gha.base_url", &self.gha.base_url)?;
        check_url("github.api_url", &self.github.api_url)?;

        let timeouts = [
            ("http.timeout_seconds", self.http.timeout_seconds),
            ("http.upload_timeout_seconds", self.http.upload_timeout_seconds),
            ("http.transaction_timeout_seconds", self.http.transaction_timeout_seconds),
            ("http.download_timeout_seconds", self.http.download_timeout_seconds),
        ];
        for (key, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than 0".to_string(),
                });
            }
        }

        if self.upload.chunk_size_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "upload.chunk_size_bytes",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.upload.chunk_size_bytes > self.upload.chunk_threshold_bytes {
            return Err(ConfigError::Invalid {
                key: "upload.chunk_size_bytes",
                reason: format!(
                    "must not exceed upload.chunk_threshold_bytes ({})",
                    self.upload.chunk_threshold_bytes
                ),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.http.upload_timeout_seconds)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.http.transaction_timeout_seconds)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.http.download_timeout_seconds)
    }
}

fn check_url(key: &'static str, value: &str) -> ConfigResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("'{}' must start with http:// or https://", value),
        })
    }
}

/// Read and parse a TOML file, returning the value and its digest
fn load_toml_file(path: &Path) -> ConfigResult<(Value, String)> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("invalid UTF-8: {}", e),
    })?;
    let doc: toml::Value = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok((toml_to_json(doc), digest))
}
