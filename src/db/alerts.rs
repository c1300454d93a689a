use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::Alert;

/// Upserts an alert keyed on `(type, dedupe_key)`: re-evaluation updates the
/// existing row (message/details/severity) instead of inserting a
/// duplicate. Returns `true` when a brand-new row was created.
pub fn upsert(
    conn: &Connection,
    alert_type: &str,
    dedupe_key: &str,
    severity: &str,
    title: &str,
    message: &str,
    details: Option<&str>,
) -> Result<bool> {
    let existed: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM alerts WHERE alert_type = ?1 AND dedupe_key = ?2)",
            params![alert_type, dedupe_key],
            |row| row.get(0),
        )
        .context("checking alert existence")?;

    conn.execute(
        "INSERT INTO alerts (created_at, alert_type, dedupe_key, severity, title, message, details, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)
         ON CONFLICT(alert_type, dedupe_key) DO UPDATE SET
            severity = excluded.severity,
            title = excluded.title,
            message = excluded.message,
            details = excluded.details",
        params![Utc::now().to_rfc3339(), alert_type, dedupe_key, severity, title, message, details],
    )
    .context("upserting alert")?;

    Ok(!existed)
}

pub fn list_unresolved(conn: &Connection) -> Result<Vec<Alert>> {
    let mut stmt = conn.prepare(
        "SELECT id, created_at, alert_type, dedupe_key, severity, title, message, details, resolved_at
         FROM alerts WHERE resolved_at IS NULL ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map([], row_to_alert)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("listing unresolved alerts")
}

pub fn list_all(conn: &Connection) -> Result<Vec<Alert>> {
    let mut stmt = conn.prepare(
        "SELECT id, created_at, alert_type, dedupe_key, severity, title, message, details, resolved_at
         FROM alerts ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map([], row_to_alert)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("listing alerts")
}

pub fn find_by_dedupe_key(conn: &Connection, alert_type: &str, dedupe_key: &str) -> Result<Option<Alert>> {
    conn.query_row(
        "SELECT id, created_at, alert_type, dedupe_key, severity, title, message, details, resolved_at
         FROM alerts WHERE alert_type = ?1 AND dedupe_key = ?2",
        params![alert_type, dedupe_key],
        row_to_alert,
    )
    .optional()
    .context("looking up alert by dedupe key")
}

pub fn resolve(conn: &Connection, id: i64, resolved_at: chrono::DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE alerts SET resolved_at = ?1 WHERE id = ?2",
        params![resolved_at.to_rfc3339(), id],
    )
    .context("resolving alert")?;
    Ok(())
}

fn row_to_alert(row: &rusqlite::Row) -> rusqlite::Result<Alert> {
    let created_at: String = row.get(1)?;
    let resolved_at: Option<String> = row.get(8)?;
    Ok(Alert {
        id: row.get(0)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
        alert_type: row.get(2)?,
        dedupe_key: row.get(3)?,
        severity: row.get(4)?,
        title: row.get(5)?,
        message: row.get(6)?,
        details: row.get(7)?,
        resolved_at: resolved_at
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_for_tests;

    #[test]
    fn re_running_the_same_alert_does_not_duplicate_it() {
        let conn = open_memory_for_tests();
        let created = upsert(&conn, "threshold_breach", "acct-1", "warning", "t", "m", None).unwrap();
        let created_again =
            upsert(&conn, "threshold_breach", "acct-1", "warning", "t", "m2", None).unwrap();

        assert!(created);
        assert!(!created_again);
        assert_eq!(list_unresolved(&conn).unwrap().len(), 1);
        assert_eq!(list_unresolved(&conn).unwrap()[0].message, "m2");
    }

    #[test]
    fn resolving_an_alert_removes_it_from_the_unresolved_list() {
        let conn = open_memory_for_tests();
        upsert(&conn, "large_unplanned_debit", "txn-9", "info", "t", "m", None).unwrap();
        let alert = find_by_dedupe_key(&conn, "large_unplanned_debit", "txn-9").unwrap().unwrap();

        resolve(&conn, alert.id, Utc::now()).unwrap();

        assert!(list_unresolved(&conn).unwrap().is_empty());
        assert_eq!(list_all(&conn).unwrap().len(), 1);
    }
}
