//! Workflow run metadata from the GitHub Actions environment

use std::collections::BTreeMap;

use vulnetix_protocol::ops::ArtifactMetadata;
use vulnetix_protocol::DEFAULT_GITHUB_API_URL;

use super::{GhaError, GhaResult};

/// Variables copied into `extra_env_vars` when set
pub const EXTRA_ENV_KEYS: [&str; 9] = [
    "GITHUB_HEAD_REF",
    "GITHUB_BASE_REF",
    "GITHUB_REF",
    "GITHUB_WORKFLOW_REF",
    "GITHUB_WORKFLOW_SHA",
    "GITHUB_RUN_ATTEMPT",
    "RUNNER_OS",
    "RUNNER_ARCH",
    "RUNNER_NAME",
];

/// Collect run metadata; unset variables become empty strings
pub fn collect_metadata<F>(env: F, artifact_names: &[String]) -> ArtifactMetadata
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| env(key).unwrap_or_default();

    let extra: BTreeMap<String, String> = EXTRA_ENV_KEYS
        .iter()
        .filter_map(|key| {
            env(key)
                .filter(|v| !v.is_empty())
                .map(|v| (key.to_string(), v))
        })
        .collect();

    ArtifactMetadata {
        repository: get("GITHUB_REPOSITORY"),
        repository_owner: get("GITHUB_REPOSITORY_OWNER"),
        run_id: get("GITHUB_RUN_ID"),
        run_number: get("GITHUB_RUN_NUMBER"),
        workflow_name: get("GITHUB_WORKFLOW"),
        job_name: get("GITHUB_JOB"),
        sha: get("GITHUB_SHA"),
        ref_name: get("GITHUB_REF_NAME"),
        ref_type: get("GITHUB_REF_TYPE"),
        event_name: get("GITHUB_EVENT_NAME"),
        actor: get("GITHUB_ACTOR"),
        server_url: get("GITHUB_SERVER_URL"),
        api_url: get("GITHUB_API_URL"),
        artifacts: artifact_names.to_vec(),
        extra_env_vars: if extra.is_empty() { None } else { Some(extra) },
    }
}

/// What the collector needs to reach the current run's artifacts
#[derive(Clone, PartialEq, Eq)]
pub struct GithubContext {
    pub token: String,
    pub api_url: String,
    pub repository: String,
    pub run_id: String,
}

impl std::fmt::Debug for GithubContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubContext")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("repository", &self.repository)
            .field("run_id", &self.run_id)
            .finish()
    }
}

impl GithubContext {
    /// Read the context from the environment
    ///
    /// `api_url_fallback` is used when `GITHUB_API_URL` is unset.
    pub fn from_env<F>(env: F, api_url_fallback: Option<&str>) -> GhaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

        let token = non_empty("GITHUB_TOKEN").ok_or(GhaError::MissingToken)?;
        let repository = non_empty("GITHUB_REPOSITORY").ok_or(GhaError::MissingEnv("GITHUB_REPOSITORY"))?;
        let run_id = non_empty("GITHUB_RUN_ID").ok_or(GhaError::MissingEnv("GITHUB_RUN_ID"))?;
        let api_url = non_empty("GITHUB_API_URL")
            .or_else(|| api_url_fallback.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());

        Ok(Self {
            token,
            api_url,
            repository,
            run_id,
        })
    }
}
