//! # History Record
//!
//! Reads and rewrites refinery's `refinery_schema_history` table directly.
//! Refinery only ever appends to it; stamping and downgrading need to insert
//! rows without running SQL and to delete rows, which the runner cannot do.
//!
//! Rows written here carry the same name and checksum refinery computes for the
//! migration, so a later `Runner::run` treats them as applied and not divergent.

use rusqlite::OptionalExtension;

use super::MigrationError;

pub const HISTORY_TABLE: &str = "refinery_schema_history";

/// Whether the history table exists yet
pub fn history_exists(conn: &rusqlite::Connection) -> Result<bool, MigrationError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
        [HISTORY_TABLE],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Create the history table with refinery's layout if it is missing
pub fn ensure_history_table(conn: &rusqlite::Connection) -> Result<(), MigrationError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS refinery_schema_history (
            version INTEGER PRIMARY KEY,
            name TEXT,
            applied_on TEXT,
            checksum TEXT
        )",
        [],
    )?;
    Ok(())
}

/// Highest recorded version with its revision id, `None` for an empty or
/// absent history
pub fn current_entry(
    conn: &rusqlite::Connection,
) -> Result<Option<(i32, String)>, MigrationError> {
    if !history_exists(conn)? {
        return Ok(None);
    }

    let entry = conn
        .query_row(
            "SELECT version, name FROM refinery_schema_history ORDER BY version DESC LIMIT 1",
            [],
            |row| Ok((row.get::<_, i32>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(entry)
}

/// Number of recorded revisions
pub fn recorded_count(conn: &rusqlite::Connection) -> Result<usize, MigrationError> {
    if !history_exists(conn)? {
        return Ok(0);
    }

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM refinery_schema_history", [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

/// Make the history say exactly `migrations[..]` up to `target_version` are
/// applied. Nothing but the history table is touched.
///
/// Runs in one transaction; returns the number of rows inserted or rewritten.
pub fn stamp(
    conn: &rusqlite::Connection,
    migrations: &[refinery::Migration],
    target_version: i32,
) -> Result<usize, MigrationError> {
    ensure_history_table(conn)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM refinery_schema_history WHERE version > ?1",
        [target_version],
    )?;

    let now = chrono::Utc::now().to_rfc3339();
    let mut written = 0;
    for migration in migrations.iter().filter(|m| m.version() <= target_version) {
        written += tx.execute(
            "INSERT INTO refinery_schema_history (version, name, applied_on, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(version) DO UPDATE SET name = excluded.name, checksum = excluded.checksum
             WHERE name IS NOT excluded.name OR checksum IS NOT excluded.checksum",
            rusqlite::params![
                migration.version(),
                migration.name(),
                now,
                migration.checksum().to_string(),
            ],
        )?;
    }
    tx.commit()?;

    tracing::debug!(target_version, written, "History stamped");
    Ok(written)
}

/// Drop the record for one version
pub fn unstamp(conn: &rusqlite::Connection, version: i32) -> Result<(), MigrationError> {
    conn.execute(
        "DELETE FROM refinery_schema_history WHERE version = ?1",
        [version],
    )?;
    Ok(())
}
