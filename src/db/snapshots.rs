use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::ForecastSnapshot;

pub fn insert(
    conn: &Connection,
    created_at: DateTime<Utc>,
    horizon_start: NaiveDate,
    horizon_end: NaiveDate,
    payload: &str,
    min_balance_cents: i64,
    min_balance_date: NaiveDate,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO forecast_snapshots (created_at, horizon_start, horizon_end, payload, min_balance_cents, min_balance_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            created_at.to_rfc3339(),
            horizon_start.to_string(),
            horizon_end.to_string(),
            payload,
            min_balance_cents,
            min_balance_date.to_string(),
        ],
    )
    .context("inserting forecast snapshot")?;
    Ok(conn.last_insert_rowid())
}

/// Latest snapshot wins for the digest; `None` when no snapshot has ever
/// been written (UI should render empty state, not an error).
pub fn latest(conn: &Connection) -> Result<Option<ForecastSnapshot>> {
    conn.query_row(
        "SELECT id, created_at, horizon_start, horizon_end, payload, min_balance_cents, min_balance_date
         FROM forecast_snapshots ORDER BY created_at DESC, id DESC LIMIT 1",
        [],
        row_to_snapshot,
    )
    .optional()
    .context("looking up latest forecast snapshot")
}

/// The snapshot immediately before `latest`, used by alert threshold-breach
/// detection to compare consecutive `min_balance_cents` values.
pub fn second_latest(conn: &Connection) -> Result<Option<ForecastSnapshot>> {
    conn.query_row(
        "SELECT id, created_at, horizon_start, horizon_end, payload, min_balance_cents, min_balance_date
         FROM forecast_snapshots ORDER BY created_at DESC, id DESC LIMIT 1 OFFSET 1",
        [],
        row_to_snapshot,
    )
    .optional()
    .context("looking up second-latest forecast snapshot")
}

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<ForecastSnapshot> {
    let created_at: String = row.get(1)?;
    let horizon_start: String = row.get(2)?;
    let horizon_end: String = row.get(3)?;
    let min_balance_date: String = row.get(6)?;
    Ok(ForecastSnapshot {
        id: row.get(0)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
        horizon_start: NaiveDate::parse_from_str(&horizon_start, "%Y-%m-%d").unwrap(),
        horizon_end: NaiveDate::parse_from_str(&horizon_end, "%Y-%m-%d").unwrap(),
        payload: row.get(4)?,
        min_balance_cents: row.get(5)?,
        min_balance_date: NaiveDate::parse_from_str(&min_balance_date, "%Y-%m-%d").unwrap(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_for_tests;

    #[test]
    fn latest_returns_the_most_recently_inserted_snapshot() {
        let conn = open_memory_for_tests();
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();

        insert(
            &conn,
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap().with_timezone(&Utc),
            d1, d2, "{}", 100, d1,
        ).unwrap();
        insert(
            &conn,
            DateTime::parse_from_rfc3339("2025-01-02T00:00:00Z").unwrap().with_timezone(&Utc),
            d2, d2, "{}", 200, d2,
        ).unwrap();

        let latest_snap = latest(&conn).unwrap().unwrap();
        assert_eq!(latest_snap.min_balance_cents, 200);
        let prev = second_latest(&conn).unwrap().unwrap();
        assert_eq!(prev.min_balance_cents, 100);
    }

    #[test]
    fn latest_is_none_before_any_snapshot_exists() {
        let conn = open_memory_for_tests();
        assert!(latest(&conn).unwrap().is_none());
    }
}
