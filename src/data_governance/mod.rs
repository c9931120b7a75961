//! # Data Governance
//!
//! Keeps the toolkit store's schema in line with what the code expects.
//!
//! ## Modules
//!
//! - `migration`: revision chain, History Record and the orchestrator
//! - `schema_repair`: introspection seam and the column repair pass
//! - `expected_schema`: columns that must exist whatever history says
//! - `init`: `reconcile()`, migrations followed by repair
//!
//! Every step in here is best effort: failures are reported and logged, never
//! returned as fatal errors.

pub mod expected_schema;
pub mod init;
pub mod migration;
pub mod schema_repair;

pub use expected_schema::EXPECTED_SCHEMA;
pub use init::{reconcile, ReconcileReport};
pub use schema_repair::{
    plan_repair, repair_schema, repair_sqlite, ColumnDef, ColumnFailure, RepairError, RepairPlan, RepairReport,
    SchemaIntrospector, SqliteIntrospector, TableSpec,
};
