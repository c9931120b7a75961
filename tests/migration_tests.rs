//! Schema reconciliation against real SQLite files.
//!
//! ## Coverage
//!
//! 1. Fresh store → head, every expected column present and nullable
//! 2. Tables created outside the chain → stamp head, then repair fills gaps
//! 3. Repair skips absent tables, ignores column letter case and is idempotent
//! 4. Downgrade and re-upgrade through the orchestrator

use rusqlite::Connection;
use tempfile::TempDir;

use ui_toolkit_lib::data_governance::migration::{
    MigrationOrchestrator, MigrationOutcome, TOOLKIT_CHAIN,
};
use ui_toolkit_lib::data_governance::schema_repair::{repair_sqlite, ColumnDef, TableSpec};
use ui_toolkit_lib::data_governance::{reconcile, EXPECTED_SCHEMA};
use ui_toolkit_lib::database::{open_store, StoreLocation};

const HEAD: &str = "b5c9e2d7f1a3";

// ============================================================================
// Helpers
// ============================================================================

fn temp_store() -> (TempDir, StoreLocation) {
    let dir = TempDir::new().expect("create temp dir");
    let location = StoreLocation::File(dir.path().join("unifi_toolkit.db"));
    (dir, location)
}

/// (exists, notnull) for a column
fn column_info(conn: &Connection, table: &str, column: &str) -> Option<bool> {
    conn.query_row(
        "SELECT \"notnull\" FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |row| row.get::<_, i64>(0),
    )
    .ok()
    .map(|notnull| notnull != 0)
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
        [table],
        |row| row.get(0),
    )
    .unwrap()
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_fresh_store_reaches_head_with_nullable_radio_column() {
    let (_dir, location) = temp_store();

    let report = reconcile(&location, &TOOLKIT_CHAIN, EXPECTED_SCHEMA);
    assert!(report.is_fully_successful(), "{:?}", report);
    assert!(matches!(
        report.migration,
        MigrationOutcome::Success { from: None, to: HEAD, applied: 10 }
    ));

    let conn = open_store(&location).unwrap();
    assert_eq!(
        column_info(&conn, "stalker_tracked_devices", "current_radio"),
        Some(false),
        "current_radio must exist and allow NULL"
    );
    let orchestrator = MigrationOrchestrator::new(&TOOLKIT_CHAIN);
    assert_eq!(orchestrator.current_revision(&conn).unwrap(), Some(HEAD));
}

#[test]
fn test_second_reconcile_changes_nothing() {
    let (_dir, location) = temp_store();
    reconcile(&location, &TOOLKIT_CHAIN, EXPECTED_SCHEMA);

    let report = reconcile(&location, &TOOLKIT_CHAIN, EXPECTED_SCHEMA);
    assert!(matches!(
        report.migration,
        MigrationOutcome::Success { applied: 0, .. }
    ));
    let repair = report.repair.unwrap();
    assert!(repair.added.is_empty());
}

#[test]
fn test_out_of_band_table_is_stamped_then_repaired() {
    let (_dir, location) = temp_store();
    let orchestrator = MigrationOrchestrator::new(&TOOLKIT_CHAIN);

    {
        let conn = open_store(&location).unwrap();
        // the store as it was after the first revision
        let root = TOOLKIT_CHAIN.ordered().unwrap()[0];
        conn.execute_batch(root.upgrade_sql).unwrap();
        orchestrator.stamp(&conn, root.id).unwrap();
        conn.execute(
            "INSERT INTO stalker_tracked_devices (mac_address, friendly_name) VALUES ('aa:bb:cc:dd:ee:ff', 'phone')",
            [],
        )
        .unwrap();

        // a newer build created its Threat Watch table directly
        conn.execute_batch(
            "CREATE TABLE threats_events (
                id INTEGER PRIMARY KEY,
                unifi_event_id VARCHAR NOT NULL UNIQUE,
                timestamp DATETIME NOT NULL,
                ignored BOOLEAN NOT NULL DEFAULT 0,
                ignored_by_rule_id INTEGER
            );",
        )
        .unwrap();
    }

    let report = reconcile(&location, &TOOLKIT_CHAIN, EXPECTED_SCHEMA);
    match &report.migration {
        MigrationOutcome::SyncRecovered { detail, stamped } => {
            assert_eq!(*stamped, HEAD);
            assert!(detail.contains("already exists"), "{}", detail);
        }
        other => panic!("expected SyncRecovered, got {:?}", other),
    }

    let repair = report.repair.as_ref().unwrap();
    assert!(repair.added.contains(&("stalker_tracked_devices", "current_radio")));
    assert!(repair.added.contains(&("stalker_connection_history", "ssid")));
    assert!(repair.added.contains(&("unifi_config", "api_key_encrypted")));
    assert!(!repair.added.iter().any(|(table, _)| *table == "threats_events"));

    let conn = open_store(&location).unwrap();
    assert_eq!(orchestrator.current_revision(&conn).unwrap(), Some(HEAD));
    for spec in EXPECTED_SCHEMA {
        for column in spec.columns {
            assert!(
                column_info(&conn, spec.table, column.name).is_some(),
                "{}.{} missing after repair",
                spec.table,
                column.name
            );
        }
    }
    // existing rows survive
    let name: String = conn
        .query_row("SELECT friendly_name FROM stalker_tracked_devices", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "phone");

    // next boot is clean
    let again = reconcile(&location, &TOOLKIT_CHAIN, EXPECTED_SCHEMA);
    assert!(again.is_fully_successful());
    assert!(again.repair.unwrap().added.is_empty());
}

// ============================================================================
// Repair
// ============================================================================

#[test]
fn test_repair_adds_exactly_the_missing_column() {
    static WIRED: &[ColumnDef] = &[ColumnDef::new("is_wired", "BOOLEAN")];
    static SPEC: &[TableSpec] = &[TableSpec::new("stalker_tracked_devices", WIRED)];

    let (_dir, location) = temp_store();
    let mut conn = open_store(&location).unwrap();
    conn.execute_batch(
        "CREATE TABLE stalker_tracked_devices (id INTEGER PRIMARY KEY, mac_address VARCHAR NOT NULL);
         INSERT INTO stalker_tracked_devices (mac_address) VALUES ('11:22:33:44:55:66');",
    )
    .unwrap();

    let report = repair_sqlite(&mut conn, SPEC).unwrap();
    assert_eq!(report.added, vec![("stalker_tracked_devices", "is_wired")]);

    let columns: Vec<String> = conn
        .prepare("SELECT name FROM pragma_table_info('stalker_tracked_devices')")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(columns, vec!["id", "mac_address", "is_wired"]);
    assert_eq!(column_info(&conn, "stalker_tracked_devices", "is_wired"), Some(false));

    let (mac, wired): (String, Option<bool>) = conn
        .query_row(
            "SELECT mac_address, is_wired FROM stalker_tracked_devices",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(mac, "11:22:33:44:55:66");
    assert_eq!(wired, None);

    // idempotent
    assert!(repair_sqlite(&mut conn, SPEC).unwrap().added.is_empty());
}

#[test]
fn test_repair_never_creates_tables() {
    let (_dir, location) = temp_store();
    let mut conn = open_store(&location).unwrap();
    conn.execute_batch("CREATE TABLE unifi_config (id INTEGER PRIMARY KEY, controller_url VARCHAR);")
        .unwrap();

    let report = repair_sqlite(&mut conn, EXPECTED_SCHEMA).unwrap();
    assert_eq!(
        report.added,
        vec![("unifi_config", "is_unifi_os"), ("unifi_config", "api_key_encrypted")]
    );
    assert_eq!(report.skipped_tables.len(), 4);
    assert!(!table_exists(&conn, "stalker_webhook_config"));
    assert!(!table_exists(&conn, "threats_events"));
}

#[test]
fn test_upper_case_live_column_does_not_block_other_repairs() {
    let (_dir, location) = temp_store();
    let mut conn = open_store(&location).unwrap();
    conn.execute_batch(
        "CREATE TABLE stalker_tracked_devices (id INTEGER PRIMARY KEY, mac_address VARCHAR NOT NULL);
         CREATE TABLE unifi_config (id INTEGER PRIMARY KEY, IS_UNIFI_OS BOOLEAN);",
    )
    .unwrap();

    let report = repair_sqlite(&mut conn, EXPECTED_SCHEMA).unwrap();
    assert!(report.is_clean(), "{:?}", report.failed);
    assert!(report.added.contains(&("stalker_tracked_devices", "current_radio")));
    assert!(report.added.contains(&("unifi_config", "api_key_encrypted")));
    assert!(!report.added.contains(&("unifi_config", "is_unifi_os")));

    drop(conn);
    let conn = open_store(&location).unwrap();
    assert_eq!(
        column_info(&conn, "stalker_tracked_devices", "current_radio"),
        Some(false)
    );
}

// ============================================================================
// Downgrade
// ============================================================================

#[test]
fn test_downgrade_one_revision_then_upgrade() {
    let (_dir, location) = temp_store();
    reconcile(&location, &TOOLKIT_CHAIN, EXPECTED_SCHEMA);

    let mut conn = open_store(&location).unwrap();
    let orchestrator = MigrationOrchestrator::new(&TOOLKIT_CHAIN);
    assert_eq!(orchestrator.downgrade(&mut conn, Some("a3f8d1c4e9b2")).unwrap(), 1);
    assert_eq!(column_info(&conn, "stalker_tracked_devices", "current_radio"), None);
    assert_eq!(orchestrator.current_revision(&conn).unwrap(), Some("a3f8d1c4e9b2"));

    assert!(matches!(
        orchestrator.run(&mut conn),
        MigrationOutcome::Success { from: Some("a3f8d1c4e9b2"), to: HEAD, applied: 1 }
    ));
    assert_eq!(
        column_info(&conn, "stalker_tracked_devices", "current_radio"),
        Some(false)
    );
}
