use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::models::SourceCursor;

pub fn get(conn: &Connection, source: &str) -> Result<Option<SourceCursor>> {
    conn.query_row(
        "SELECT source, last_cursor, updated_at FROM source_cursors WHERE source = ?1",
        params![source],
        row_to_cursor,
    )
    .optional()
    .context("looking up source cursor")
}

/// Advances the cursor. Must be called from within the same transaction as
/// the ingest run's final upsert batch, so a failed run never moves it.
pub fn advance(tx: &Transaction, source: &str, last_cursor: &str) -> Result<()> {
    tx.execute(
        "INSERT INTO source_cursors (source, last_cursor, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(source) DO UPDATE SET last_cursor = excluded.last_cursor, updated_at = excluded.updated_at",
        params![source, last_cursor, Utc::now().to_rfc3339()],
    )
    .context("advancing source cursor")?;
    Ok(())
}

fn row_to_cursor(row: &rusqlite::Row) -> rusqlite::Result<SourceCursor> {
    let updated_at: String = row.get(2)?;
    Ok(SourceCursor {
        source: row.get(0)?,
        last_cursor: row.get(1)?,
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .unwrap()
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_for_tests;

    #[test]
    fn cursor_is_unchanged_when_the_transaction_is_rolled_back() {
        let mut conn = open_memory_for_tests();
        {
            let tx = conn.transaction().unwrap();
            advance(&tx, "chase", "2025-01-01").unwrap();
            // simulate a failed run: drop without commit
        }
        assert!(get(&conn, "chase").unwrap().is_none());
    }

    #[test]
    fn cursor_advances_on_commit() {
        let mut conn = open_memory_for_tests();
        {
            let tx = conn.transaction().unwrap();
            advance(&tx, "chase", "2025-01-01").unwrap();
            tx.commit().unwrap();
        }
        assert_eq!(get(&conn, "chase").unwrap().unwrap().last_cursor, "2025-01-01");
    }
}
