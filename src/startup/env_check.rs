//! `.env` loading and the required-key check.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::EnvSnapshot;
use crate::startup::StartupError;

/// Merge `path` into `env` without overriding existing values.
///
/// Returns the path when the file existed and was loaded. A file that exists
/// but cannot be parsed is fatal.
pub fn load_env_file(env: &mut EnvSnapshot, path: &Path) -> Result<Option<PathBuf>, StartupError> {
    if !path.exists() {
        debug!(path = %path.display(), "No .env file");
        return Ok(None);
    }

    let env_file_error = |source| StartupError::EnvFile {
        path: path.to_path_buf(),
        source,
    };

    let mut applied = 0usize;
    let mut total = 0usize;
    for item in dotenvy::from_path_iter(path).map_err(env_file_error)? {
        let (key, value) = item.map_err(env_file_error)?;
        total += 1;
        if env.set_default(key, value) {
            applied += 1;
        }
    }

    info!(
        path = %path.display(),
        applied,
        kept = total - applied,
        "Loaded .env file"
    );
    Ok(Some(path.to_path_buf()))
}

/// Require a config source and a non-empty `ENCRYPTION_KEY`.
pub fn validate_env(env: &EnvSnapshot, env_file_loaded: bool) -> Result<(), StartupError> {
    if !env_file_loaded && env.non_empty("ENCRYPTION_KEY").is_none() {
        return Err(StartupError::NoConfigSource);
    }

    if env.non_empty("ENCRYPTION_KEY").is_none() {
        return Err(StartupError::MissingEncryptionKey);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_env_file_does_not_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "ENCRYPTION_KEY=from-dotenv\nAPP_PORT=9000\n# comment\n").unwrap();

        let mut env = EnvSnapshot::from_pairs([("ENCRYPTION_KEY", "from-process")]);
        let loaded = load_env_file(&mut env, &path).unwrap();

        assert_eq!(loaded, Some(path));
        assert_eq!(env.get("ENCRYPTION_KEY"), Some("from-process"));
        assert_eq!(env.get("APP_PORT"), Some("9000"));
    }

    #[test]
    fn test_missing_env_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let mut env = EnvSnapshot::default();
        assert_eq!(load_env_file(&mut env, &dir.path().join(".env")).unwrap(), None);
        assert!(env.is_empty());
    }

    #[test]
    fn test_malformed_env_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "ENCRYPTION_KEY='unterminated\n").unwrap();

        let mut env = EnvSnapshot::default();
        assert_matches!(
            load_env_file(&mut env, &path),
            Err(StartupError::EnvFile { .. })
        );
    }

    #[test]
    fn test_validation_order() {
        let empty = EnvSnapshot::default();
        assert_matches!(validate_env(&empty, false), Err(StartupError::NoConfigSource));
        assert_matches!(validate_env(&empty, true), Err(StartupError::MissingEncryptionKey));

        let blank = EnvSnapshot::from_pairs([("ENCRYPTION_KEY", "")]);
        assert_matches!(validate_env(&blank, true), Err(StartupError::MissingEncryptionKey));

        let keyed = EnvSnapshot::from_pairs([("ENCRYPTION_KEY", "k")]);
        assert!(validate_env(&keyed, false).is_ok());
    }
}
