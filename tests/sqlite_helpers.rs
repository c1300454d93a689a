#![allow(dead_code)]

use rusqlite::Connection;
use tempfile::TempDir;

use crate::cli_helpers::db_path;

pub fn open(home: &TempDir) -> Connection {
    Connection::open(db_path(home)).expect("opening test database")
}

pub fn transaction_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0)).unwrap()
}

pub fn transaction_count_for_source(conn: &Connection, source: &str) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions WHERE source = ?1", [source], |r| r.get(0))
        .unwrap()
}

pub fn cursor_for_source(conn: &Connection, source: &str) -> Option<String> {
    conn.query_row("SELECT last_cursor FROM source_cursors WHERE source = ?1", [source], |r| {
        r.get(0)
    })
    .ok()
}

pub fn category_map_count(conn: &Connection, source: &str) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM category_map WHERE source = ?1", [source], |r| r.get(0))
        .unwrap()
}

pub fn unmapped_category_count(conn: &Connection, source: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM categories c
         WHERE c.source = ?1
           AND NOT EXISTS (
               SELECT 1 FROM category_map m
               WHERE m.source = c.source AND m.external_id = c.external_id
           )",
        [source],
        |r| r.get(0),
    )
    .unwrap()
}

pub fn latest_forecast_snapshot_created_at(conn: &Connection) -> Option<String> {
    conn.query_row(
        "SELECT created_at FROM forecast_snapshots ORDER BY created_at DESC LIMIT 1",
        [],
        |r| r.get(0),
    )
    .ok()
}

pub fn forecast_snapshot_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM forecast_snapshots", [], |r| r.get(0)).unwrap()
}

pub fn alert_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM alerts", [], |r| r.get(0)).unwrap()
}

pub fn alert_count_by_dedupe_key(conn: &Connection, dedupe_key: &str) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM alerts WHERE dedupe_key = ?1", [dedupe_key], |r| {
        r.get(0)
    })
    .unwrap()
}

pub fn ingest_audit_count(conn: &Connection, source: &str) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM ingest_audits WHERE source = ?1", [source], |r| {
        r.get(0)
    })
    .unwrap()
}

pub fn account_anchor(conn: &Connection, account_id: i64) -> Option<(String, i64)> {
    conn.query_row(
        "SELECT anchor_date, anchor_balance_cents FROM account_anchors WHERE account_id = ?1",
        [account_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .ok()
}

pub fn account_id_by_name(conn: &Connection, name: &str) -> Option<i64> {
    conn.query_row("SELECT id FROM accounts WHERE name = ?1", [name], |r| r.get(0)).ok()
}

pub fn applied_migrations(conn: &Connection) -> Vec<String> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version").unwrap();
    stmt.query_map([], |r| r.get(0)).unwrap().collect::<Result<_, _>>().unwrap()
}
