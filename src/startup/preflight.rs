//! Data directory checks for file-backed stores.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::database::StoreLocation;
use crate::startup::StartupError;

/// Probe file written and removed in the data directory
pub const WRITE_PROBE_FILE: &str = ".write_test";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightOutcome {
    /// In-memory or non-SQLite store, nothing checked
    NotFileBased,
    /// Directory exists and is writable
    Ready { data_dir: PathBuf, created: bool },
}

/// Directory holding the store file; `.` for a bare file name
pub fn data_dir_of(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Absolute form of `path` for messages, without requiring it to exist
pub fn display_path(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    absolute.display().to_string()
}

/// Make sure the store's directory exists and accepts writes
pub fn preflight_storage(location: &StoreLocation) -> Result<PreflightOutcome, StartupError> {
    let Some(db_path) = location.file_path() else {
        debug!(?location, "Store is not file-based, skipping data directory check");
        return Ok(PreflightOutcome::NotFileBased);
    };
    let data_dir = data_dir_of(db_path);

    let created = !data_dir.is_dir();
    if created {
        fs::create_dir_all(&data_dir).map_err(|source| StartupError::DataDirCreate {
            dir: data_dir.clone(),
            source,
        })?;
        info!(path = %data_dir.display(), "Created data directory");
    }

    let probe = data_dir.join(WRITE_PROBE_FILE);
    fs::write(&probe, b"")
        .and_then(|_| fs::remove_file(&probe))
        .map_err(|source| StartupError::DataDirNotWritable {
            dir: data_dir.clone(),
            source,
        })?;

    debug!(path = %data_dir.display(), "Data directory is writable");
    Ok(PreflightOutcome::Ready { data_dir, created })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_data_dir_of() {
        assert_eq!(data_dir_of(Path::new("./data/app.db")), PathBuf::from("./data"));
        assert_eq!(data_dir_of(Path::new("app.db")), PathBuf::from("."));
        assert_eq!(data_dir_of(Path::new("/srv/app.db")), PathBuf::from("/srv"));
    }

    #[test]
    fn test_not_file_based_is_noop() {
        assert_eq!(
            preflight_storage(&StoreLocation::Memory).unwrap(),
            PreflightOutcome::NotFileBased
        );
        assert_eq!(
            preflight_storage(&StoreLocation::Other {
                scheme: "postgresql".into()
            })
            .unwrap(),
            PreflightOutcome::NotFileBased
        );
    }

    #[test]
    fn test_creates_nested_directory_and_leaves_no_probe() {
        let root = TempDir::new().unwrap();
        let data_dir = root.path().join("a").join("b");
        let location = StoreLocation::File(data_dir.join("toolkit.db"));

        let outcome = preflight_storage(&location).unwrap();
        assert_eq!(
            outcome,
            PreflightOutcome::Ready {
                data_dir: data_dir.clone(),
                created: true
            }
        );
        assert!(data_dir.is_dir());
        assert!(!data_dir.join(WRITE_PROBE_FILE).exists());

        assert_matches!(
            preflight_storage(&location).unwrap(),
            PreflightOutcome::Ready { created: false, .. }
        );
    }

    #[test]
    fn test_uncreatable_directory_is_fatal() {
        let root = TempDir::new().unwrap();
        // a regular file where a directory should be
        let blocker = root.path().join("data");
        std::fs::write(&blocker, "not a dir").unwrap();
        let location = StoreLocation::File(blocker.join("sub").join("toolkit.db"));

        assert_matches!(
            preflight_storage(&location),
            Err(StartupError::DataDirCreate { .. })
        );
    }

    #[test]
    fn test_failed_write_probe_is_fatal() {
        let root = TempDir::new().unwrap();
        // the probe path is taken by a directory, so writing it fails
        std::fs::create_dir(root.path().join(WRITE_PROBE_FILE)).unwrap();
        let location = StoreLocation::File(root.path().join("toolkit.db"));

        let err = preflight_storage(&location).unwrap_err();
        assert_matches!(
            &err,
            StartupError::DataDirNotWritable { dir, .. } if dir == root.path()
        );
        assert_eq!(err.to_string(), "Data directory is not writable!");
        assert!(err.remediation().contains("chown 1000:1000 ./data"));
    }
}
