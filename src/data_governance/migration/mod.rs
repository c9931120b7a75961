//! # Migrations
//!
//! Ordered revision chain for the toolkit store, executed through Refinery.
//!
//! ## Components
//!
//! - `definitions`: `Revision` / `MigrationChain` (linked chain, walked root → head)
//! - `toolkit`: the compiled-in chain of the toolkit store
//! - `history`: the History Record (`refinery_schema_history`): read, stamp, unstamp
//! - `coordinator`: the orchestrator that upgrades, classifies failures and stamps
//!
//! ## Failure classification
//!
//! An upgrade failure is never fatal. It is turned into a [`MigrationFailure`]
//! whose [`FailureKind`] decides what happens next:
//!
//! | kind | meaning | recovery |
//! |------|---------|----------|
//! | `SchemaSyncConflict` | structures already exist (created out of band) | stamp history to head |
//! | `Other` | anything else | log a warning, continue degraded |
//!
//! ```rust,ignore
//! let failure = MigrationFailure::classify("duplicate column name: is_wired");
//! assert_eq!(failure.kind, FailureKind::SchemaSyncConflict);
//! ```

// ============================================================================
// Submodules
// ============================================================================

pub mod coordinator;
pub mod definitions;
pub mod history;
pub mod toolkit;

// ============================================================================
// Re-exports
// ============================================================================

pub use coordinator::{MigrationOrchestrator, MigrationOutcome};
pub use definitions::{MigrationChain, Revision};
pub use toolkit::TOOLKIT_CHAIN;

/// Error-message fragments that mean "the structure is already there".
///
/// Matched case-insensitively against the whole error chain.
pub const SCHEMA_SYNC_SIGNATURES: &[&str] = &[
    "already exists",
    "duplicate column",
    "table already exists",
    "unique constraint failed",
];

// ============================================================================
// Errors
// ============================================================================

/// Migration layer errors
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Refinery error: {0}")]
    Refinery(String),

    #[error("Invalid migration chain: {0}")]
    InvalidChain(String),

    #[error("Unknown revision: {0}")]
    UnknownRevision(String),
}

impl From<rusqlite::Error> for MigrationError {
    fn from(e: rusqlite::Error) -> Self {
        MigrationError::Database(e.to_string())
    }
}

/// How an upgrade failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The failing statement tried to create something that already exists.
    SchemaSyncConflict,
    /// Anything else.
    Other,
}

/// A classified upgrade failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{detail}")]
pub struct MigrationFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl MigrationFailure {
    /// Classify a failure from its message alone.
    pub fn classify(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let kind = if matches_sync_signature(&detail) {
            FailureKind::SchemaSyncConflict
        } else {
            FailureKind::Other
        };
        Self { kind, detail }
    }

    /// Classify a failure from an error and its `source()` chain.
    ///
    /// A SQLite UNIQUE / PRIMARY KEY constraint code anywhere in the chain is a
    /// conflict even when the driver message is worded differently.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut messages = vec![err.to_string()];
        let mut constraint_conflict = is_unique_constraint(err);

        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !messages.iter().any(|m| m.contains(&text)) {
                messages.push(text);
            }
            constraint_conflict |= is_unique_constraint(cause);
            source = cause.source();
        }

        let mut failure = Self::classify(messages.join(": "));
        if constraint_conflict {
            failure.kind = FailureKind::SchemaSyncConflict;
        }
        failure
    }

    pub fn is_schema_sync_conflict(&self) -> bool {
        self.kind == FailureKind::SchemaSyncConflict
    }
}

impl From<MigrationError> for MigrationFailure {
    fn from(e: MigrationError) -> Self {
        match e {
            // Chain problems are programming errors, not store drift
            MigrationError::InvalidChain(_) | MigrationError::UnknownRevision(_) => Self {
                kind: FailureKind::Other,
                detail: e.to_string(),
            },
            other => Self::classify(other.to_string()),
        }
    }
}

fn matches_sync_signature(message: &str) -> bool {
    let lower = message.to_lowercase();
    SCHEMA_SYNC_SIGNATURES
        .iter()
        .any(|signature| lower.contains(signature))
}

fn is_unique_constraint(err: &(dyn std::error::Error + 'static)) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => matches!(
            e.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
