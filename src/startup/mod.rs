//! # Startup
//!
//! Runs once, synchronously, before anything else touches the store:
//!
//! ```text
//! START → resolve_secrets → validate_env → preflight_storage
//!       → run_migrations {SUCCESS | SYNC_RECOVERED | DEGRADED}
//!       → repair_schema (always) → READY
//! ```
//!
//! Only the first three steps can fail; their [`StartupError`]s are fatal.
//! Migration and repair problems are carried in the [`BootReport`].

pub mod banner;
pub mod env_check;
pub mod preflight;
pub mod secrets;

use std::path::PathBuf;

use tracing::info;

use crate::config::{EnvSnapshot, ResolvedConfig};
use crate::data_governance::init::{reconcile, ReconcileReport};
use crate::data_governance::migration::{MigrationChain, TOOLKIT_CHAIN};
use crate::data_governance::schema_repair::TableSpec;
use crate::data_governance::EXPECTED_SCHEMA;

pub use preflight::PreflightOutcome;

const RULE_WIDTH: usize = 70;

// ============================================================================
// Errors
// ============================================================================

/// Fatal startup errors
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{file_var}={} but file does not exist or is not readable", .path.display())]
    SecretFileMissing { file_var: String, path: PathBuf },

    #[error("Failed to read {file_var}={}: {source}", .path.display())]
    SecretFileUnreadable {
        file_var: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load {}: {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("No .env file found and ENCRYPTION_KEY not set!")]
    NoConfigSource,

    #[error("ENCRYPTION_KEY not set in .env file!")]
    MissingEncryptionKey,

    #[error("Invalid configuration: {0}")]
    InvalidSetting(String),

    #[error("Cannot create data directory!")]
    DataDirCreate {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data directory is not writable!")]
    DataDirNotWritable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StartupError {
    /// Operator-facing message with remediation steps
    pub fn remediation(&self) -> String {
        let body: Vec<String> = match self {
            StartupError::SecretFileMissing { .. }
            | StartupError::SecretFileUnreadable { .. }
            | StartupError::EnvFile { .. }
            | StartupError::InvalidSetting(_) => return format!("ERROR: {}", self),
            StartupError::NoConfigSource => vec![
                "Either create a .env file (cp .env.example .env)".into(),
                "or pass environment variables directly to the container.".into(),
            ],
            StartupError::MissingEncryptionKey => vec![
                "The ENCRYPTION_KEY is required to encrypt sensitive data.".into(),
                "Generate a new key with:".into(),
                String::new(),
                "  python -c \"from cryptography.fernet import Fernet; print(Fernet.generate_key().decode())\"".into(),
                String::new(),
                "Then add it to your .env file:".into(),
                String::new(),
                "  ENCRYPTION_KEY=your_generated_key_here".into(),
            ],
            StartupError::DataDirCreate { dir, source } => vec![
                format!("  Path: {}", preflight::display_path(dir)),
                format!("  Cause: {}", source),
                String::new(),
                "The data directory does not exist and cannot be created.".into(),
                "Fix this by creating it on the host before starting the container:".into(),
                String::new(),
                "  mkdir -p ./data".into(),
                "  chown 1000:1000 ./data".into(),
            ],
            StartupError::DataDirNotWritable { dir, source } => vec![
                format!("  Path: {}", preflight::display_path(dir)),
                format!("  Cause: {}", source),
                String::new(),
                "The application needs write access to store its database.".into(),
                "Fix this by updating permissions on the host:".into(),
                String::new(),
                "  chown 1000:1000 ./data".into(),
                String::new(),
                "Or if using a container manager (Portainer, Synology, TrueNAS, etc.),".into(),
                "make sure the volume mount for /app/data has write permissions for".into(),
                "UID 1000.".into(),
            ],
        };

        let rule = "=".repeat(RULE_WIDTH);
        let mut lines = vec![rule.clone(), format!("ERROR: {}", self), rule.clone(), String::new()];
        lines.extend(body);
        lines.push(String::new());
        lines.push(rule);
        lines.join("\n")
    }
}

// ============================================================================
// Boot
// ============================================================================

/// Inputs that are not part of the environment
#[derive(Debug, Clone)]
pub struct BootOptions {
    /// `.env` file to load after secret resolution
    pub env_file: PathBuf,
    pub chain: &'static MigrationChain,
    pub expected: &'static [TableSpec],
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(".env"),
            chain: &TOOLKIT_CHAIN,
            expected: EXPECTED_SCHEMA,
        }
    }
}

/// Everything startup produced on the way to READY
#[derive(Debug)]
pub struct BootReport {
    pub config: ResolvedConfig,
    pub secret_warnings: Vec<String>,
    pub preflight: PreflightOutcome,
    pub reconcile: ReconcileReport,
}

/// Run the startup sequence against an environment snapshot
pub fn boot(env: EnvSnapshot, options: &BootOptions) -> Result<BootReport, StartupError> {
    // Step 1: _FILE secrets
    let resolution = secrets::resolve_secrets(&env)?;
    let mut env = resolution.env;

    // Step 2: .env + required key
    let env_file = env_check::load_env_file(&mut env, &options.env_file)?;
    env_check::validate_env(&env, env_file.is_some())?;
    let config = ResolvedConfig::build(&env, env_file)?;

    // Step 3: data directory
    let preflight = preflight::preflight_storage(&config.store)?;

    // Step 4 + 5: migrations, then repair (never fatal)
    let report = reconcile(&config.store, options.chain, options.expected);

    info!(migration = report.migration.label(), "READY");
    Ok(BootReport {
        config,
        secret_warnings: resolution.warnings,
        preflight,
        reconcile: report,
    })
}
