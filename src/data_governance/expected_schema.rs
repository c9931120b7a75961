//! Columns the toolkit code reads and writes that must exist in every store.
//!
//! Only columns added after a table was first created belong here; tables
//! themselves are the migration chain's job. All of them are nullable. The
//! `ignored` flag is created `NOT NULL` by its revision but is repaired as a
//! nullable column with the same default.

use super::schema_repair::{ColumnDef, TableSpec};

static THREATS_EVENTS: &[ColumnDef] = &[
    ColumnDef::new("ignored", "BOOLEAN").with_default("0"),
    ColumnDef::new("ignored_by_rule_id", "INTEGER"),
];

static STALKER_TRACKED_DEVICES: &[ColumnDef] = &[
    ColumnDef::new("is_blocked", "BOOLEAN"),
    ColumnDef::new("is_wired", "BOOLEAN"),
    ColumnDef::new("current_switch_mac", "VARCHAR"),
    ColumnDef::new("current_switch_name", "VARCHAR"),
    ColumnDef::new("current_switch_port", "INTEGER"),
    ColumnDef::new("current_ssid", "VARCHAR"),
    ColumnDef::new("current_radio", "VARCHAR"),
];

static STALKER_CONNECTION_HISTORY: &[ColumnDef] = &[
    ColumnDef::new("is_wired", "BOOLEAN"),
    ColumnDef::new("switch_mac", "VARCHAR"),
    ColumnDef::new("switch_name", "VARCHAR"),
    ColumnDef::new("switch_port", "INTEGER"),
    ColumnDef::new("ssid", "VARCHAR"),
];

static STALKER_WEBHOOK_CONFIG: &[ColumnDef] = &[
    ColumnDef::new("event_device_blocked", "BOOLEAN"),
    ColumnDef::new("event_device_unblocked", "BOOLEAN"),
];

static UNIFI_CONFIG: &[ColumnDef] = &[
    ColumnDef::new("is_unifi_os", "BOOLEAN"),
    ColumnDef::new("api_key_encrypted", "BLOB"),
];

pub static EXPECTED_SCHEMA: &[TableSpec] = &[
    TableSpec::new("threats_events", THREATS_EVENTS),
    TableSpec::new("stalker_tracked_devices", STALKER_TRACKED_DEVICES),
    TableSpec::new("stalker_connection_history", STALKER_CONNECTION_HISTORY),
    TableSpec::new("stalker_webhook_config", STALKER_WEBHOOK_CONFIG),
    TableSpec::new("unifi_config", UNIFI_CONFIG),
];
