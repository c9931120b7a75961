//! # Schema reconciliation entry point
//!
//! Opens the store, brings migration history up to head and then always runs
//! the repair pass. Nothing in here fails: every problem ends up in the
//! returned [`ReconcileReport`] and in the log.
//!
//! ```rust,ignore
//! use ui_toolkit_lib::data_governance::init::reconcile;
//!
//! let report = reconcile(&location, &TOOLKIT_CHAIN, EXPECTED_SCHEMA);
//! println!("migrations: {}", report.migration.label());
//! ```

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::data_governance::migration::{MigrationChain, MigrationOrchestrator, MigrationOutcome};
use crate::data_governance::schema_repair::{self, RepairError, RepairReport, TableSpec};
use crate::database::{self, StoreLocation};

/// Reconciliation report
#[derive(Debug)]
pub struct ReconcileReport {
    pub migration: MigrationOutcome,
    pub repair: Result<RepairReport, RepairError>,
    pub total_duration_ms: u64,
}

impl ReconcileReport {
    /// Migrations succeeded and repair added every missing column
    pub fn is_fully_successful(&self) -> bool {
        matches!(self.migration, MigrationOutcome::Success { .. })
            && self.repair.as_ref().map_or(false, RepairReport::is_clean)
    }

    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let MigrationOutcome::Degraded { detail } = &self.migration {
            warnings.push(format!("Migration warning: {}", detail));
        }
        match &self.repair {
            Ok(report) => {
                for failure in &report.failed {
                    warnings.push(format!("Schema repair warning: {}", failure.error));
                }
            }
            Err(e) => warnings.push(format!("Schema repair warning: {}", e)),
        }
        warnings
    }
}

/// Run migrations, then the repair pass, against the store at `location`
pub fn reconcile(
    location: &StoreLocation,
    chain: &'static MigrationChain,
    expected: &[TableSpec],
) -> ReconcileReport {
    let start = Instant::now();
    info!(?location, chain = chain.name, "Reconciling database schema");

    // Step 1: open the store
    let mut conn = match database::open_store(location) {
        Ok(conn) => conn,
        Err(e) => {
            let detail = format!("cannot open store: {}", e);
            warn!(
                "Migration warning: {}. The application will continue, but some features may not work correctly.",
                detail
            );
            warn!("Schema repair warning: {}", detail);
            return ReconcileReport {
                migration: MigrationOutcome::Degraded {
                    detail: detail.clone(),
                },
                repair: Err(RepairError::Unreachable(detail)),
                total_duration_ms: start.elapsed().as_millis() as u64,
            };
        }
    };

    // Step 2: migrations (success / recovered / degraded)
    let migration = MigrationOrchestrator::new(chain).run(&mut conn);

    // Step 3: column repair, whatever the migrations did
    let repair = schema_repair::repair_sqlite(&mut conn, expected);
    match &repair {
        Ok(report) => debug!(
            added = report.added.len(),
            failed = report.failed.len(),
            skipped_tables = report.skipped_tables.len(),
            "Schema repair finished"
        ),
        Err(e) => warn!("Schema repair warning: {}", e),
    }

    let report = ReconcileReport {
        migration,
        repair,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        migration = report.migration.label(),
        total_duration_ms = report.total_duration_ms,
        warnings_count = report.warnings().len(),
        "Schema reconciliation complete"
    );
    report
}
