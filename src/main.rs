//! Vulnetix CLI
//!
//! Entry point for the `vulnetix` command-line tool.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

use vulnetix::auth::{AuthMethod, CredentialStore, Credentials, StoreLocation};
use vulnetix::cancel::{CancelToken, EXIT_CODE_INTERRUPTED};
use vulnetix::client::{ApiClient, RateLimit, ReqwestTransport, Transport};
use vulnetix::config::{ConfigPaths, LoadedSettings, Settings};
use vulnetix::gha::{
    collect_metadata, ArtifactCollector, ArtifactOutcome, ArtifactUploader, GhaError, GithubContext,
    TransactionState,
};
use vulnetix::logging::{self, LogFormat};
use vulnetix::upload::{ArtifactFormat, UploadClient};
use vulnetix::vdb::VdbClient;

#[derive(Parser)]
#[command(name = "vulnetix")]
#[command(about = "Vulnetix vulnerability management CLI", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file to use instead of .vulnetix/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log level or filter directive (e.g. "debug", "vulnetix=trace")
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format: pretty, compact or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored credentials
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },

    /// Upload an artifact file (SBOM, SARIF, VEX)
    Upload {
        /// File to upload
        #[arg(long, short = 'f')]
        file: PathBuf,

        /// Artifact format; detected from the file when omitted
        #[arg(long)]
        format: Option<ArtifactFormat>,

        /// Organization id (UUID) overriding the stored one
        #[arg(long)]
        org_id: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// GitHub Actions artifact integration
    Gha {
        #[command(subcommand)]
        action: GhaCommands,
    },

    /// Query the vulnerability database
    Vdb {
        #[command(subcommand)]
        action: VdbCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Save credentials
    Login {
        /// Authentication method: apikey or sigv4
        #[arg(long, default_value = "apikey")]
        method: AuthMethod,

        /// Organization id (UUID)
        #[arg(long)]
        org_id: String,

        /// API key or signing secret
        #[arg(long)]
        secret: String,

        /// Where to store them: home or project
        #[arg(long, default_value = "home")]
        store: StoreLocation,
    },

    /// Show which credentials are in effect
    Status,

    /// Remove stored credential files
    Logout,

    /// Check the credentials against the service
    Verify,
}

#[derive(Subcommand)]
enum GhaCommands {
    /// Upload every artifact of the current workflow run
    Upload {
        /// Organization id (UUID) overriding the stored one
        #[arg(long)]
        org_id: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the processing status of a transaction or artifact
    Status {
        /// Transaction id
        #[arg(long, conflicts_with = "uuid", required_unless_present = "uuid")]
        txnid: Option<String>,

        /// Artifact uuid
        #[arg(long)]
        uuid: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum VdbCommands {
    /// Details for one CVE
    Cve { id: String },

    /// List package ecosystems
    Ecosystems,

    /// Versions of a product, or one version when given
    Versions {
        product: String,
        version: Option<String>,
        #[arg(long, default_value_t = 0)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Vulnerabilities affecting a package
    Vulns {
        package: String,
        #[arg(long, default_value_t = 0)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Print the database OpenAPI document
    Spec,
}

fn main() {
    let cli = Cli::parse();
    let loaded = load_settings(&cli.global);

    if let Err(e) = logging::init(&loaded.settings.logging.level, loaded.settings.logging.format) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    tracing::debug!(layers = %loaded.summary(), "configuration loaded");
    let settings = loaded.settings;

    match cli.command {
        Commands::Auth { action } => match action {
            AuthCommands::Login {
                method,
                org_id,
                secret,
                store,
            } => run_auth_login(method, &org_id, &secret, store),
            AuthCommands::Status => run_auth_status(),
            AuthCommands::Logout => run_auth_logout(),
            AuthCommands::Verify => run_auth_verify(&settings),
        },
        Commands::Upload {
            file,
            format,
            org_id,
            json,
        } => run_upload(&settings, &file, format, org_id.as_deref(), json),
        Commands::Gha { action } => match action {
            GhaCommands::Upload { org_id, json } => run_gha_upload(&settings, org_id.as_deref(), json),
            GhaCommands::Status { txnid, uuid, json } => {
                run_gha_status(&settings, txnid.as_deref(), uuid.as_deref(), json)
            }
        },
        Commands::Vdb { action } => run_vdb(&settings, action),
    }
}

/// Print an error with its hint and exit 1
fn fail(message: impl std::fmt::Display, hint: Option<&str>) -> ! {
    eprintln!("Error: {}", message);
    if let Some(hint) = hint {
        eprintln!("Hint: {}", hint);
    }
    process::exit(1);
}

fn load_settings(global: &GlobalArgs) -> LoadedSettings {
    let mut overrides = json!({});
    if let Some(url) = &global.base_url {
        overrides["api"] = json!({ "base_url": url });
    }
    if let Some(level) = &global.log_level {
        overrides["logging"]["level"] = json!(level);
    }
    if let Some(format) = global.log_format {
        overrides["logging"]["format"] = json!(format.as_str());
    }

    let home = std::env::var_os("HOME").filter(|h| !h.is_empty()).map(PathBuf::from);
    let paths = ConfigPaths::discover(home.as_deref(), Path::new("."), global.config.clone());
    match Settings::load(&paths, Some(overrides)) {
        Ok(loaded) => loaded,
        Err(e) => fail(&e, e.hint()),
    }
}

fn transport() -> Arc<dyn Transport> {
    match ReqwestTransport::new() {
        Ok(t) => Arc::new(t),
        Err(e) => fail(format!("failed to build HTTP client: {}", e), None),
    }
}

fn parse_org_id(value: &str) -> String {
    match uuid::Uuid::parse_str(value) {
        Ok(id) => id.to_string(),
        Err(_) => fail(
            format!("invalid organization id '{}'", value),
            Some("organization ids are UUIDs, e.g. 123e4567-e89b-12d3-a456-426614174000"),
        ),
    }
}

fn resolve_credentials(org_override: Option<&str>) -> Credentials {
    let store = CredentialStore::from_process();
    let creds = match store.resolve() {
        Ok((creds, source)) => {
            tracing::debug!(%source, method = %creds.method(), "using credentials");
            creds
        }
        Err(e) => fail(&e, e.hint()),
    };
    match org_override {
        Some(org) => creds.with_org_id(parse_org_id(org)),
        None => creds,
    }
}

fn api_client(settings: &Settings, base_url: &str, creds: Credentials) -> ApiClient {
    ApiClient::new(transport(), base_url, creds)
        .with_token_url(&settings.vdb.base_url)
        .with_timeout(settings.timeout())
        .with_token_timeout(settings.timeout())
}

fn print_rate_limit(rate_limit: Option<RateLimit>) {
    if let Some(summary) = rate_limit.and_then(|r| r.summary()) {
        eprintln!("{}", summary);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(format!("failed to encode output: {}", e), None),
    }
}

fn run_auth_login(method: AuthMethod, org_id: &str, secret: &str, location: StoreLocation) {
    let org_id = parse_org_id(org_id);
    let creds = match Credentials::new(method, org_id, secret) {
        Ok(c) => c,
        Err(e) => fail(&e, e.hint()),
    };
    match CredentialStore::from_process().save(&creds, location) {
        Ok(path) => println!("Credentials saved to {}", path.display()),
        Err(e) => fail(&e, e.hint()),
    }
}

fn run_auth_status() {
    let (message, creds) = CredentialStore::from_process().status();
    println!("{}", message);
    if let Some(creds) = creds {
        println!("Secret: {}", creds.masked_secret());
    }
}

fn run_auth_logout() {
    match CredentialStore::from_process().remove() {
        Ok(removed) if removed.is_empty() => println!("No stored credentials found"),
        Ok(removed) => {
            for path in removed {
                println!("Removed {}", path.display());
            }
        }
        Err(e) => fail(&e, e.hint()),
    }
}

fn run_auth_verify(settings: &Settings) {
    let creds = resolve_credentials(None);
    let client = UploadClient::new(api_client(settings, &settings.api.base_url, creds));
    match client.verify_auth() {
        Ok(resp) => {
            let org = resp.org_id.unwrap_or_else(|| client.api().org_id().to_string());
            println!("Credentials valid (org: {})", org);
        }
        Err(e) => fail(&e, e.hint()),
    }
    print_rate_limit(client.api().last_rate_limit());
}

fn run_upload(settings: &Settings, file: &Path, format: Option<ArtifactFormat>, org_id: Option<&str>, json_output: bool) {
    let creds = resolve_credentials(org_id);
    let api = api_client(settings, &settings.api.base_url, creds).with_timeout(settings.upload_timeout());
    let client = UploadClient::new(api).with_chunking(
        settings.upload.chunk_threshold_bytes,
        settings.upload.chunk_size_bytes,
    );

    let outcome = match client.upload_file(file, format) {
        Ok(o) => o,
        Err(e) => fail(&e, e.hint()),
    };

    if json_output {
        print_json(&json!({
            "file": outcome.file_name,
            "format": outcome.format.as_str(),
            "session_id": outcome.session_id,
            "chunks": outcome.plan.total_chunks,
            "result": outcome.finalize,
        }));
    } else {
        println!("Uploaded {} ({})", outcome.file_name, outcome.format);
        if let Some(record) = &outcome.finalize.pipeline_record {
            println!("Pipeline: {} ({})", record.uuid, record.processing_state);
        }
        if outcome.finalize.is_duplicate {
            println!("Note: an identical artifact was uploaded before");
        }
    }
    print_rate_limit(client.api().last_rate_limit());
}

fn gha_uploader(settings: &Settings, org_id: Option<&str>) -> ArtifactUploader {
    let creds = resolve_credentials(org_id);
    let org = creds.org_id().to_string();
    let api = api_client(settings, &settings.gha.base_url, creds).with_timeout(settings.transaction_timeout());
    ArtifactUploader::new(api, org)
}

fn run_gha_upload(settings: &Settings, org_id: Option<&str>, json_output: bool) {
    let env = |key: &str| std::env::var(key).ok();
    if env("GITHUB_ACTIONS").as_deref() != Some("true") {
        fail(
            GhaError::MissingEnv("GITHUB_ACTIONS"),
            Some("'vulnetix gha upload' must run inside a GitHub Actions workflow"),
        );
    }

    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_ctrlc() {
        tracing::warn!(error = %e, "could not install signal handler");
    }

    let context = match GithubContext::from_env(env, Some(&settings.github.api_url)) {
        Ok(c) => c,
        Err(e) => fail(&e, e.hint()),
    };
    let collector = ArtifactCollector::new(transport(), context).with_download_timeout(settings.download_timeout());
    let uploader = gha_uploader(settings, org_id);

    let artifacts = match collector.list_artifacts(&cancel) {
        Ok(a) => a,
        Err(e) if e.is_interrupted() => process::exit(EXIT_CODE_INTERRUPTED),
        Err(e) => fail(&e, e.hint()),
    };
    if artifacts.is_empty() {
        println!("No artifacts found for this workflow run");
        return;
    }

    let names: Vec<String> = artifacts.iter().map(|a| a.name.clone()).collect();
    let metadata = collect_metadata(env, &names);
    let report = match uploader.run_transaction(&collector, &metadata, &artifacts, &cancel) {
        Ok(r) => r,
        Err(e) if e.is_interrupted() => {
            eprintln!("Interrupted");
            process::exit(EXIT_CODE_INTERRUPTED);
        }
        Err(e) => fail(&e, e.hint()),
    };

    if json_output {
        let outcomes: Vec<Value> = report
            .outcomes
            .iter()
            .map(|(name, outcome)| match outcome {
                ArtifactOutcome::Uploaded { uuid, queue_path } => {
                    json!({"name": name, "uuid": uuid, "queue_path": queue_path})
                }
                ArtifactOutcome::Failed { stage, error } => {
                    json!({"name": name, "failed": stage.to_string(), "error": error})
                }
            })
            .collect();
        print_json(&json!({"txnid": report.txn_id, "artifacts": outcomes}));
    } else {
        println!("Transaction: {}", report.txn_id);
        for (name, outcome) in &report.outcomes {
            match outcome {
                ArtifactOutcome::Uploaded { uuid, .. } => println!("  {}: uploaded ({})", name, uuid),
                ArtifactOutcome::Failed { stage, error } => println!("  {}: {} failed: {}", name, stage, error),
            }
        }
        println!("Check progress with: vulnetix gha status --txnid {}", report.txn_id);
    }

    if report.state() == TransactionState::PartiallyFailed {
        process::exit(1);
    }
}

fn run_gha_status(settings: &Settings, txn_id: Option<&str>, uuid: Option<&str>, json_output: bool) {
    let uploader = gha_uploader(settings, None);
    let result = match (txn_id, uuid) {
        (Some(txn), _) => uploader.transaction_status(txn),
        (None, Some(uuid)) => uploader.artifact_status(uuid),
        (None, None) => fail("one of --txnid or --uuid is required", None),
    };
    let status = match result {
        Ok(s) => s,
        Err(e) => fail(&e, e.hint()),
    };

    if json_output {
        print_json(&status);
    } else {
        println!("Status: {}", status.status);
        if let Some(txn) = &status.txn_id {
            println!("Transaction: {}", txn);
        }
        for artifact in &status.artifacts {
            println!("  {} ({}): {}", artifact.name, artifact.uuid, artifact.status);
        }
        if let Some(message) = &status.message {
            println!("{}", message);
        }
    }
}

fn run_vdb(settings: &Settings, action: VdbCommands) {
    let creds = resolve_credentials(None);
    let client = match VdbClient::new(api_client(settings, &settings.vdb.base_url, creds)) {
        Ok(c) => c,
        Err(e) => fail(&e, e.hint()),
    };

    let result = match action {
        VdbCommands::Cve { id } => client.cve(&id),
        VdbCommands::Ecosystems => client
            .ecosystems()
            .and_then(|e| serde_json::to_value(e).map_err(Into::into)),
        VdbCommands::Versions {
            product,
            version: Some(version),
            ..
        } => client.product_version(&product, &version),
        VdbCommands::Versions {
            product,
            version: None,
            limit,
            offset,
        } => client.product_versions(&product, limit, offset),
        VdbCommands::Vulns { package, limit, offset } => {
            client.package_vulnerabilities(&package, limit, offset)
        }
        VdbCommands::Spec => client.openapi_spec(),
    };

    match result {
        Ok(value) => print_json(&value),
        Err(e) => fail(&e, e.hint()),
    }
    print_rate_limit(client.last_rate_limit());
}
