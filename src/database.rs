//! Store location parsing and SQLite connection setup.
//!
//! The toolkit is configured with a SQLAlchemy-style URL such as
//! `sqlite+aiosqlite:///./data/unifi_toolkit.db`. Only the scheme and the path
//! are interpreted here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

pub const DEFAULT_DATABASE_URL: &str = "sqlite+aiosqlite:///./data/unifi_toolkit.db";

const BUSY_TIMEOUT: Duration = Duration::from_millis(3000);

/// Where the store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// SQLite database file
    File(PathBuf),
    /// SQLite in-memory database
    Memory,
    /// Any engine other than SQLite
    Other { scheme: String },
}

impl StoreLocation {
    /// Parse a connection URL.
    ///
    /// A scheme starting with `sqlite` is file-backed and its path is the text
    /// after the last non-overlapping `///`: `sqlite:///./data/x.db` is
    /// `./data/x.db` and `sqlite:////srv/x.db` is `/srv/x.db`.
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        let scheme = url.split_once(':').map(|(s, _)| s).unwrap_or(url);

        if !scheme.to_ascii_lowercase().starts_with("sqlite") {
            return StoreLocation::Other {
                scheme: scheme.to_string(),
            };
        }

        // `////abs` splits into `sqlite:` and `/abs`, keeping the leading slash
        let path = if url.contains("///") {
            url.split("///").last().unwrap_or("")
        } else {
            url.split_once("://").map(|(_, rest)| rest).unwrap_or("")
        };
        // query string (e.g. `?mode=ro`) is not part of the path
        let path = path.split('?').next().unwrap_or("");

        if path.is_empty() || path == ":memory:" {
            StoreLocation::Memory
        } else {
            StoreLocation::File(PathBuf::from(path))
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match self {
            StoreLocation::File(path) => Some(path),
            _ => None,
        }
    }
}

/// Open the store with the connection settings every caller expects
pub fn open_store(location: &StoreLocation) -> rusqlite::Result<Connection> {
    let conn = match location {
        StoreLocation::File(path) => Connection::open(path)?,
        StoreLocation::Memory => Connection::open_in_memory()?,
        StoreLocation::Other { scheme } => {
            return Err(rusqlite::Error::InvalidParameterName(format!(
                "unsupported database scheme '{}'",
                scheme
            )))
        }
    };

    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}
