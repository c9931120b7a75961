//! `_FILE` secret indirection.
//!
//! For a supported `VAR`, setting `VAR_FILE=/run/secrets/var` makes the trimmed
//! file contents the value of `VAR`, replacing any direct value.

use std::path::Path;

use tracing::{debug, warn};

use crate::config::EnvSnapshot;
use crate::startup::StartupError;

/// Variables that accept a `_FILE` counterpart
pub const FILE_SUPPORTED_VARS: &[&str] = &[
    "ENCRYPTION_KEY",
    "AUTH_USERNAME",
    "AUTH_PASSWORD_HASH",
    "DATABASE_URL",
    "UNIFI_PASSWORD",
    "UNIFI_API_KEY",
];

/// Snapshot after resolution
#[derive(Debug, Clone)]
pub struct SecretResolution {
    pub env: EnvSnapshot,
    /// Variables whose value came from a file
    pub resolved: Vec<&'static str>,
    /// Direct value and file both set
    pub warnings: Vec<String>,
}

/// Resolve every supported `_FILE` variable in `env`.
///
/// The input is not modified; running again on the output yields the same
/// values.
pub fn resolve_secrets(env: &EnvSnapshot) -> Result<SecretResolution, StartupError> {
    let mut resolved_env = env.clone();
    let mut resolved = Vec::new();
    let mut warnings = Vec::new();

    for &var in FILE_SUPPORTED_VARS {
        let file_var = format!("{}_FILE", var);
        let Some(file_path) = env.non_empty(&file_var) else {
            continue;
        };

        let path = Path::new(file_path);
        if !path.is_file() {
            return Err(StartupError::SecretFileMissing {
                file_var,
                path: path.to_path_buf(),
            });
        }

        let value = std::fs::read_to_string(path).map_err(|source| {
            StartupError::SecretFileUnreadable {
                file_var: file_var.clone(),
                path: path.to_path_buf(),
                source,
            }
        })?;

        if env.non_empty(var).is_some() {
            let message = format!("Both {} and {} are set, using {}", var, file_var, file_var);
            warn!("{}", message);
            warnings.push(message);
        }

        debug!(var, file_var = %file_var, "Secret loaded from file");
        resolved_env.set(var, value.trim());
        resolved.push(var);
    }

    Ok(SecretResolution {
        env: resolved_env,
        resolved,
        warnings,
    })
}
