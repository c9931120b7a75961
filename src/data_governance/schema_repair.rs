//! # Schema Repair
//!
//! Compares live tables against the expected schema map and adds every
//! missing column. Runs after migrations on every boot, whatever they did.
//!
//! ## Rules
//!
//! - Only columns are added, always nullable (`ADD COLUMN "c" TYPE [DEFAULT v]`).
//! - A table that does not exist is skipped, never created.
//! - A column that exists is left alone, whatever its type or letter case, so
//!   repeated passes are no-ops.
//! - A column that cannot be added is recorded in the report and the pass
//!   moves on to the next one.
//!
//! Storage access goes through [`SchemaIntrospector`]; [`SqliteIntrospector`]
//! is the production implementation.

use std::collections::BTreeSet;

use rusqlite::Connection;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unreachable: {0}")]
    Unreachable(String),
}

impl From<rusqlite::Error> for RepairError {
    fn from(e: rusqlite::Error) -> Self {
        RepairError::Database(e.to_string())
    }
}

// ============================================================================
// Expected schema types
// ============================================================================

/// A column that must exist. Rendered without `NOT NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub default: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            default: None,
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    /// Type and default as they appear after the column name
    pub fn definition(&self) -> String {
        match self.default {
            Some(default) => format!("{} DEFAULT {}", self.sql_type, default),
            None => self.sql_type.to_string(),
        }
    }
}

/// Expected columns of one table
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableSpec {
    pub const fn new(table: &'static str, columns: &'static [ColumnDef]) -> Self {
        Self { table, columns }
    }
}

// ============================================================================
// Introspection seam
// ============================================================================

/// Storage operations the repair pass needs
pub trait SchemaIntrospector {
    /// Column names of `table`, `None` when the table does not exist
    fn list_columns(&self, table: &str) -> Result<Option<BTreeSet<String>>, RepairError>;

    /// Add a nullable column
    fn add_column(&mut self, table: &str, name: &str, definition: &str)
        -> Result<(), RepairError>;
}

/// [`SchemaIntrospector`] over a SQLite connection (or transaction)
pub struct SqliteIntrospector<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteIntrospector<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl SchemaIntrospector for SqliteIntrospector<'_> {
    fn list_columns(&self, table: &str) -> Result<Option<BTreeSet<String>>, RepairError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1 COLLATE NOCASE)",
            [table],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Some(columns))
    }

    fn add_column(
        &mut self,
        table: &str,
        name: &str,
        definition: &str,
    ) -> Result<(), RepairError> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(name),
            definition
        );

        // a failed column must not take earlier ones in the same transaction with it
        self.conn.execute_batch("SAVEPOINT repair_column")?;
        match self.conn.execute(&sql, []) {
            Ok(_) => {
                self.conn.execute_batch("RELEASE repair_column")?;
                Ok(())
            }
            Err(e) => {
                self.conn
                    .execute_batch("ROLLBACK TO repair_column; RELEASE repair_column")?;
                Err(RepairError::Database(format!(
                    "adding {}.{} failed: {}",
                    table, name, e
                )))
            }
        }
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// ============================================================================
// Repair pass
// ============================================================================

/// What a repair pass would do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    pub missing: Vec<(&'static str, ColumnDef)>,
    pub skipped_tables: Vec<&'static str>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
    }
}

/// A column the pass could not add
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFailure {
    pub table: &'static str,
    pub column: &'static str,
    pub error: String,
}

/// What a repair pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// (table, column) pairs added
    pub added: Vec<(&'static str, &'static str)>,
    /// Expected tables absent from the store
    pub skipped_tables: Vec<&'static str>,
    pub failed: Vec<ColumnFailure>,
}

impl RepairReport {
    /// Every missing column was added
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Dry run: list missing columns per existing table without touching anything
pub fn plan_repair<I>(introspector: &I, expected: &[TableSpec]) -> Result<RepairPlan, RepairError>
where
    I: SchemaIntrospector + ?Sized,
{
    let mut plan = RepairPlan::default();

    for spec in expected {
        let Some(live) = introspector.list_columns(spec.table)? else {
            tracing::debug!(table = spec.table, "Schema repair: table absent, skipped");
            plan.skipped_tables.push(spec.table);
            continue;
        };

        // SQLite identifiers are case-insensitive
        let live: BTreeSet<String> = live.iter().map(|c| c.to_ascii_lowercase()).collect();
        for column in spec.columns {
            if !live.contains(&column.name.to_ascii_lowercase()) {
                plan.missing.push((spec.table, *column));
            }
        }
    }

    Ok(plan)
}

/// Add every missing expected column.
///
/// Only introspection errors abort the pass; a column that cannot be added is
/// logged and recorded in [`RepairReport::failed`].
pub fn repair_schema<I>(
    introspector: &mut I,
    expected: &[TableSpec],
) -> Result<RepairReport, RepairError>
where
    I: SchemaIntrospector + ?Sized,
{
    let plan = plan_repair(&*introspector, expected)?;
    let mut report = RepairReport {
        added: Vec::with_capacity(plan.missing.len()),
        skipped_tables: plan.skipped_tables,
        failed: Vec::new(),
    };

    for (table, column) in plan.missing {
        tracing::info!(
            table,
            column = column.name,
            "🔧 Schema repair: adding missing column '{}' to {}",
            column.name,
            table
        );
        match introspector.add_column(table, column.name, &column.definition()) {
            Ok(()) => report.added.push((table, column.name)),
            Err(e) => {
                tracing::warn!(table, column = column.name, error = %e, "Schema repair: column not added");
                report.failed.push(ColumnFailure {
                    table,
                    column: column.name,
                    error: e.to_string(),
                });
            }
        }
    }

    if report.added.is_empty() && report.failed.is_empty() {
        tracing::debug!("Schema repair: nothing to add");
    }
    Ok(report)
}

/// Repair a SQLite store in one transaction.
///
/// Columns that were added are committed even when others failed; an
/// introspection error rolls the whole pass back.
pub fn repair_sqlite(
    conn: &mut Connection,
    expected: &[TableSpec],
) -> Result<RepairReport, RepairError> {
    let tx = conn.transaction()?;
    let report = {
        let mut introspector = SqliteIntrospector::new(&tx);
        repair_schema(&mut introspector, expected)?
    };
    tx.commit()?;
    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================
