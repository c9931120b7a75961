//! # Toolkit store revisions
//!
//! The revision chain of the toolkit SQLite store, root first. New revisions
//! are appended at the end and name the previous head as `down_revision`.
//!
//! The root revision uses plain `CREATE TABLE`: on a store whose tables were
//! created outside the chain it fails with "table ... already exists", which
//! the orchestrator recognises and answers by stamping.

use super::definitions::{MigrationChain, Revision};

pub static TOOLKIT_REVISIONS: &[Revision] = &[
    Revision::new(
        "0e41c9a7d2b8",
        None,
        "Initial Wi-Fi Stalker and UniFi config schema",
        r#"
CREATE TABLE unifi_config (
    id INTEGER PRIMARY KEY,
    controller_url VARCHAR NOT NULL,
    username VARCHAR,
    password_encrypted BLOB,
    site_id VARCHAR NOT NULL DEFAULT 'default',
    verify_ssl BOOLEAN NOT NULL DEFAULT 0,
    last_successful_connection DATETIME
);

CREATE TABLE stalker_tracked_devices (
    id INTEGER PRIMARY KEY,
    mac_address VARCHAR NOT NULL UNIQUE,
    friendly_name VARCHAR,
    is_connected BOOLEAN NOT NULL DEFAULT 0,
    current_ap_mac VARCHAR,
    current_ap_name VARCHAR,
    current_ip_address VARCHAR,
    current_signal_strength INTEGER,
    last_seen DATETIME,
    added_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE stalker_connection_history (
    id INTEGER PRIMARY KEY,
    device_id INTEGER NOT NULL REFERENCES stalker_tracked_devices(id) ON DELETE CASCADE,
    ap_mac VARCHAR,
    ap_name VARCHAR,
    connected_at DATETIME NOT NULL,
    disconnected_at DATETIME,
    duration_seconds INTEGER,
    signal_strength INTEGER
);

CREATE INDEX ix_stalker_connection_history_device_id
    ON stalker_connection_history (device_id);

CREATE TABLE stalker_webhook_config (
    id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL,
    webhook_type VARCHAR NOT NULL,
    url VARCHAR NOT NULL,
    event_device_connected BOOLEAN NOT NULL DEFAULT 1,
    event_device_disconnected BOOLEAN NOT NULL DEFAULT 1,
    event_device_roamed BOOLEAN NOT NULL DEFAULT 0,
    enabled BOOLEAN NOT NULL DEFAULT 1,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_triggered DATETIME
);
"#,
    )
    .with_downgrade(
        r#"
DROP TABLE stalker_webhook_config;
DROP INDEX ix_stalker_connection_history_device_id;
DROP TABLE stalker_connection_history;
DROP TABLE stalker_tracked_devices;
DROP TABLE unifi_config;
"#,
    ),
    Revision::new(
        "1f52dab8e3c9",
        Some("0e41c9a7d2b8"),
        "Add Threat Watch tables",
        r#"
CREATE TABLE threats_events (
    id INTEGER PRIMARY KEY,
    unifi_event_id VARCHAR NOT NULL UNIQUE,
    timestamp DATETIME NOT NULL,
    severity INTEGER,
    category VARCHAR,
    signature VARCHAR,
    src_ip VARCHAR,
    dest_ip VARCHAR,
    action VARCHAR,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE threats_webhook_config (
    id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL,
    webhook_type VARCHAR NOT NULL,
    url VARCHAR NOT NULL,
    min_severity INTEGER NOT NULL DEFAULT 2,
    enabled BOOLEAN NOT NULL DEFAULT 1,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )
    .with_downgrade(
        r#"
DROP TABLE threats_webhook_config;
DROP TABLE threats_events;
"#,
    ),
    Revision::new(
        "2a63ebc9f4da",
        Some("1f52dab8e3c9"),
        "Add device blocking to Wi-Fi Stalker",
        "ALTER TABLE stalker_tracked_devices ADD COLUMN is_blocked BOOLEAN;",
    )
    .with_downgrade("ALTER TABLE stalker_tracked_devices DROP COLUMN is_blocked;"),
    Revision::new(
        "3b74fcda05eb",
        Some("2a63ebc9f4da"),
        "Add block and unblock webhook events",
        r#"
ALTER TABLE stalker_webhook_config ADD COLUMN event_device_blocked BOOLEAN;
ALTER TABLE stalker_webhook_config ADD COLUMN event_device_unblocked BOOLEAN;
"#,
    )
    .with_downgrade(
        r#"
ALTER TABLE stalker_webhook_config DROP COLUMN event_device_unblocked;
ALTER TABLE stalker_webhook_config DROP COLUMN event_device_blocked;
"#,
    ),
    Revision::new(
        "4c850deb16fc",
        Some("3b74fcda05eb"),
        "Record whether the controller runs UniFi OS",
        "ALTER TABLE unifi_config ADD COLUMN is_unifi_os BOOLEAN;",
    )
    .with_downgrade("ALTER TABLE unifi_config DROP COLUMN is_unifi_os;"),
    Revision::new(
        "5d961efc270d",
        Some("4c850deb16fc"),
        "Add wired device tracking to Wi-Fi Stalker",
        r#"
ALTER TABLE stalker_tracked_devices ADD COLUMN is_wired BOOLEAN;
ALTER TABLE stalker_tracked_devices ADD COLUMN current_switch_mac VARCHAR;
ALTER TABLE stalker_tracked_devices ADD COLUMN current_switch_name VARCHAR;
ALTER TABLE stalker_tracked_devices ADD COLUMN current_switch_port INTEGER;
ALTER TABLE stalker_connection_history ADD COLUMN is_wired BOOLEAN;
ALTER TABLE stalker_connection_history ADD COLUMN switch_mac VARCHAR;
ALTER TABLE stalker_connection_history ADD COLUMN switch_name VARCHAR;
ALTER TABLE stalker_connection_history ADD COLUMN switch_port INTEGER;
"#,
    )
    .with_downgrade(
        r#"
ALTER TABLE stalker_connection_history DROP COLUMN switch_port;
ALTER TABLE stalker_connection_history DROP COLUMN switch_name;
ALTER TABLE stalker_connection_history DROP COLUMN switch_mac;
ALTER TABLE stalker_connection_history DROP COLUMN is_wired;
ALTER TABLE stalker_tracked_devices DROP COLUMN current_switch_port;
ALTER TABLE stalker_tracked_devices DROP COLUMN current_switch_name;
ALTER TABLE stalker_tracked_devices DROP COLUMN current_switch_mac;
ALTER TABLE stalker_tracked_devices DROP COLUMN is_wired;
"#,
    ),
    Revision::new(
        "6ea72f0d381e",
        Some("5d961efc270d"),
        "Support API key authentication",
        "ALTER TABLE unifi_config ADD COLUMN api_key_encrypted BLOB;",
    )
    .with_downgrade("ALTER TABLE unifi_config DROP COLUMN api_key_encrypted;"),
    Revision::new(
        "7fb8301e492f",
        Some("6ea72f0d381e"),
        "Add Threat Watch ignore rules",
        r#"
CREATE TABLE threats_ignore_rules (
    id INTEGER PRIMARY KEY,
    ip_address VARCHAR NOT NULL,
    description VARCHAR,
    match_source BOOLEAN NOT NULL DEFAULT 1,
    match_destination BOOLEAN NOT NULL DEFAULT 0,
    enabled BOOLEAN NOT NULL DEFAULT 1,
    events_ignored INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);

ALTER TABLE threats_events ADD COLUMN ignored BOOLEAN NOT NULL DEFAULT 0;
ALTER TABLE threats_events ADD COLUMN ignored_by_rule_id INTEGER;
"#,
    )
    .with_downgrade(
        r#"
ALTER TABLE threats_events DROP COLUMN ignored_by_rule_id;
ALTER TABLE threats_events DROP COLUMN ignored;
DROP TABLE threats_ignore_rules;
"#,
    ),
    Revision::new(
        "a3f8d1c4e9b2",
        Some("7fb8301e492f"),
        "Add SSID tracking to Wi-Fi Stalker",
        r#"
ALTER TABLE stalker_tracked_devices ADD COLUMN current_ssid VARCHAR;
ALTER TABLE stalker_connection_history ADD COLUMN ssid VARCHAR;
"#,
    )
    .with_downgrade(
        r#"
ALTER TABLE stalker_connection_history DROP COLUMN ssid;
ALTER TABLE stalker_tracked_devices DROP COLUMN current_ssid;
"#,
    ),
    Revision::new(
        "b5c9e2d7f1a3",
        Some("a3f8d1c4e9b2"),
        "Add radio band tracking to Wi-Fi Stalker",
        "ALTER TABLE stalker_tracked_devices ADD COLUMN current_radio VARCHAR;",
    )
    .with_downgrade("ALTER TABLE stalker_tracked_devices DROP COLUMN current_radio;"),
];

/// The toolkit store chain
pub static TOOLKIT_CHAIN: MigrationChain = MigrationChain::new("toolkit", TOOLKIT_REVISIONS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_linear_and_ends_at_radio_revision() {
        let ordered = TOOLKIT_CHAIN.ordered().unwrap();
        assert_eq!(ordered.len(), 10);
        assert_eq!(ordered[0].id, "0e41c9a7d2b8");
        assert_eq!(TOOLKIT_CHAIN.head().unwrap(), "b5c9e2d7f1a3");
        assert_eq!(
            ordered[ordered.len() - 2].id,
            "a3f8d1c4e9b2",
            "radio revision must sit on top of the SSID revision"
        );
    }

    #[test]
    fn test_every_revision_can_be_reversed() {
        for revision in TOOLKIT_CHAIN.revisions {
            assert!(
                !revision.downgrade_sql.trim().is_empty(),
                "{} has no downgrade",
                revision.id
            );
        }
    }

    #[test]
    fn test_full_chain_applies_to_empty_store() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for revision in TOOLKIT_CHAIN.ordered().unwrap() {
            conn.execute_batch(revision.upgrade_sql).unwrap();
        }
        let radio_columns: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('stalker_tracked_devices') WHERE name = 'current_radio'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(radio_columns, 1);

        for revision in TOOLKIT_CHAIN.ordered().unwrap().into_iter().rev() {
            conn.execute_batch(revision.downgrade_sql).unwrap();
        }
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }
}
