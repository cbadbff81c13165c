//! Built-in defaults (first layer)

use vulnetix_protocol::{
    DEFAULT_API_BASE_URL, DEFAULT_GHA_BASE_URL, DEFAULT_GITHUB_API_URL, DEFAULT_VDB_BASE_URL,
};

use super::{
    ApiSettings, GhaSettings, GithubSettings, HttpSettings, LoggingSettings, UploadSettings,
    VdbSettings,
};
use crate::logging::LogFormat;
use crate::upload::{DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD};

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Default for VdbSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_VDB_BASE_URL.to_string(),
        }
    }
}

impl Default for GhaSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GHA_BASE_URL.to_string(),
        }
    }
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            upload_timeout_seconds: 300,
            transaction_timeout_seconds: 120,
            download_timeout_seconds: 600,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_threshold_bytes: DEFAULT_CHUNK_THRESHOLD,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Settings;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.vdb.base_url, "https://api.vdb.vulnetix.com/v1");
        assert_eq!(settings.http.download_timeout_seconds, 600);
        assert_eq!(settings.upload.chunk_size_bytes, 5 * 1024 * 1024);
    }
}
