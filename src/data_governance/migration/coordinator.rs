//! # Migration Orchestrator
//!
//! Applies a [`MigrationChain`] to a SQLite store through Refinery and absorbs
//! every failure.
//!
//! ## Flow
//!
//! ```text
//! upgrade ──ok──────────────────────────────▶ Success
//!    │
//!    └─err─▶ classify ──SchemaSyncConflict──▶ stamp head ──ok──▶ SyncRecovered
//!                 │                                 └─err─▶ Degraded
//!                 └─Other─────────────────────────────────▶ Degraded
//! ```
//!
//! Stamping marks history as current without checking that every column of
//! every skipped revision exists; the schema repair pass that follows closes
//! that gap.

use rusqlite::Connection;

use super::definitions::{MigrationChain, Revision};
use super::history;
use super::{MigrationError, MigrationFailure};

/// Result of one orchestrator run. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Every pending revision applied (possibly none)
    Success {
        from: Option<&'static str>,
        to: &'static str,
        applied: usize,
    },
    /// A schema-sync conflict was answered by stamping history to `stamped`
    SyncRecovered {
        detail: String,
        stamped: &'static str,
    },
    /// Migration failed and could not be recovered
    Degraded { detail: String },
}

impl MigrationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MigrationOutcome::Success { .. } => "SUCCESS",
            MigrationOutcome::SyncRecovered { .. } => "SYNC_RECOVERED",
            MigrationOutcome::Degraded { .. } => "DEGRADED",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, MigrationOutcome::Degraded { .. })
    }
}

/// Migration Orchestrator
#[derive(Debug, Clone, Copy)]
pub struct MigrationOrchestrator {
    chain: &'static MigrationChain,
}

impl MigrationOrchestrator {
    pub fn new(chain: &'static MigrationChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &'static MigrationChain {
        self.chain
    }

    /// Upgrade to head, then recover or degrade on failure.
    pub fn run(&self, conn: &mut Connection) -> MigrationOutcome {
        tracing::info!(chain = self.chain.name, "🚀 [MigrationOrchestrator] Running database migrations...");

        let from = match self.current_revision(conn) {
            Ok(from) => from,
            Err(e) => {
                let failure = MigrationFailure::from(e);
                return self.degrade(failure.detail);
            }
        };

        let failure = match self.upgrade(conn) {
            Ok(applied) => {
                return match self.chain.head() {
                    Ok(to) => {
                        tracing::info!(
                            chain = self.chain.name,
                            from = from.unwrap_or("base"),
                            to,
                            applied,
                            "✅ [MigrationOrchestrator] Database migrations complete"
                        );
                        MigrationOutcome::Success { from, to, applied }
                    }
                    Err(e) => self.degrade(e.to_string()),
                };
            }
            Err(failure) => failure,
        };

        if !failure.is_schema_sync_conflict() {
            return self.degrade(failure.detail);
        }

        tracing::warn!(
            chain = self.chain.name,
            detail = %failure.detail,
            "⚠️ [MigrationOrchestrator] Migration detected schema sync issue"
        );
        tracing::info!("🔧 [MigrationOrchestrator] Attempting to synchronize migration history...");

        match self.stamp_head(conn) {
            Ok(stamped) => {
                tracing::info!(
                    chain = self.chain.name,
                    revision = stamped,
                    "✅ [MigrationOrchestrator] Migration history synchronized with current schema"
                );
                MigrationOutcome::SyncRecovered {
                    detail: failure.detail,
                    stamped,
                }
            }
            Err(e) => {
                tracing::warn!(
                    chain = self.chain.name,
                    error = %e,
                    "❌ [MigrationOrchestrator] Failed to synchronize migration history"
                );
                MigrationOutcome::Degraded {
                    detail: format!("{}; stamp failed: {}", failure.detail, e),
                }
            }
        }
    }

    fn degrade(&self, detail: String) -> MigrationOutcome {
        tracing::warn!(
            chain = self.chain.name,
            "⚠️ [MigrationOrchestrator] Migration warning: {}",
            detail
        );
        tracing::warn!(
            "The application will continue, but some features may not work correctly."
        );
        MigrationOutcome::Degraded { detail }
    }

    /// Apply every pending revision, one transaction each.
    ///
    /// Returns the number of revisions applied. A failure leaves the revisions
    /// before it recorded.
    pub fn upgrade(&self, conn: &mut Connection) -> Result<usize, MigrationFailure> {
        let migrations = self.build_migrations()?;

        // set_grouped(false): each revision commits with its history row, so a
        // failure keeps the earlier ones recorded.
        let runner = refinery::Runner::new(&migrations)
            .set_grouped(false)
            .set_abort_divergent(false)
            .set_abort_missing(false);

        let report = runner
            .run(conn)
            .map_err(|e| MigrationFailure::from_error(&e))?;

        let applied = report.applied_migrations();
        for migration in applied {
            tracing::info!(
                version = migration.version(),
                revision = migration.name(),
                "[MigrationOrchestrator] applied"
            );
        }
        Ok(applied.len())
    }

    /// Revision currently recorded in history, `None` before the first one
    pub fn current_revision(
        &self,
        conn: &Connection,
    ) -> Result<Option<&'static str>, MigrationError> {
        let Some((version, name)) = history::current_entry(conn)? else {
            return Ok(None);
        };

        let ordered = self.chain.ordered()?;
        match usize::try_from(version - 1).ok().and_then(|idx| ordered.get(idx)) {
            Some(revision) if revision.id == name => Ok(Some(revision.id)),
            _ => Err(MigrationError::UnknownRevision(format!("V{}__{}", version, name))),
        }
    }

    /// Record `target` and everything below it as applied without running SQL
    pub fn stamp(&self, conn: &Connection, target: &str) -> Result<(), MigrationError> {
        let version = self.chain.version_of(target)?;
        let migrations = self.build_migrations()?;
        history::stamp(conn, &migrations, version)?;

        tracing::info!(
            chain = self.chain.name,
            revision = target,
            version,
            "[MigrationOrchestrator] History stamped"
        );
        Ok(())
    }

    /// Stamp the chain head, returning its id
    pub fn stamp_head(&self, conn: &Connection) -> Result<&'static str, MigrationError> {
        let head = self.chain.head()?;
        self.stamp(conn, head)?;
        Ok(head)
    }

    /// Reverse every applied revision above `target` (`None` = base), newest
    /// first. Each revision's downgrade and the removal of its history row
    /// share one transaction.
    ///
    /// Returns the number of revisions reversed.
    pub fn downgrade(
        &self,
        conn: &mut Connection,
        target: Option<&str>,
    ) -> Result<usize, MigrationError> {
        let target_version = match target {
            Some(id) => self.chain.version_of(id)?,
            None => 0,
        };
        let current_version = match self.current_revision(conn)? {
            Some(id) => self.chain.version_of(id)?,
            None => 0,
        };
        if current_version <= target_version {
            return Ok(0);
        }

        let ordered = self.chain.ordered()?;
        let to_reverse: Vec<(i32, &Revision)> = ordered
            .iter()
            .enumerate()
            .map(|(idx, revision)| (idx as i32 + 1, *revision))
            .filter(|(version, _)| *version > target_version && *version <= current_version)
            .rev()
            .collect();

        for (version, revision) in &to_reverse {
            if revision.downgrade_sql.trim().is_empty() {
                return Err(MigrationError::InvalidChain(format!(
                    "revision '{}' has no downgrade",
                    revision.id
                )));
            }

            let tx = conn.transaction()?;
            tx.execute_batch(revision.downgrade_sql)?;
            history::unstamp(&tx, *version)?;
            tx.commit()?;

            tracing::info!(
                chain = self.chain.name,
                revision = revision.id,
                message = revision.message,
                "⬇️ [MigrationOrchestrator] Downgraded"
            );
        }

        Ok(to_reverse.len())
    }

    /// Refinery migrations for the chain: version = position, name = id
    fn build_migrations(&self) -> Result<Vec<refinery::Migration>, MigrationError> {
        self.chain
            .ordered()?
            .iter()
            .enumerate()
            .map(|(idx, revision)| {
                refinery::Migration::unapplied(
                    &format!("V{}__{}", idx + 1, revision.id),
                    revision.upgrade_sql,
                )
                .map_err(|e| MigrationError::Refinery(format!("{}: {}", revision.id, e)))
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
