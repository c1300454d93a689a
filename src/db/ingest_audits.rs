use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{IngestAudit, IngestStatus};

pub fn insert(
    conn: &Connection,
    source: &str,
    run_started_at: DateTime<Utc>,
    run_finished_at: DateTime<Utc>,
    rows_upserted: i64,
    status: IngestStatus,
    notes: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO ingest_audits (source, run_started_at, run_finished_at, rows_upserted, status, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            source,
            run_started_at.to_rfc3339(),
            run_finished_at.to_rfc3339(),
            rows_upserted,
            status.as_str(),
            notes,
        ],
    )
    .context("inserting ingest audit row")?;
    Ok(conn.last_insert_rowid())
}

pub fn list_for_source(conn: &Connection, source: &str) -> Result<Vec<IngestAudit>> {
    let mut stmt = conn.prepare(
        "SELECT id, source, run_started_at, run_finished_at, rows_upserted, status, notes
         FROM ingest_audits WHERE source = ?1 ORDER BY run_started_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![source], row_to_audit)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("listing ingest audits")
}

fn row_to_audit(row: &rusqlite::Row) -> rusqlite::Result<IngestAudit> {
    let run_started_at: String = row.get(2)?;
    let run_finished_at: Option<String> = row.get(3)?;
    Ok(IngestAudit {
        id: row.get(0)?,
        source: row.get(1)?,
        run_started_at: DateTime::parse_from_rfc3339(&run_started_at)
            .unwrap()
            .with_timezone(&Utc),
        run_finished_at: run_finished_at
            .map(|s| DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
        rows_upserted: row.get(4)?,
        status: row.get(5)?,
        notes: row.get(6)?,
    })
}
