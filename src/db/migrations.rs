//! Numeric-prefix SQL migrations, applied in order and recorded in
//! `schema_migrations`.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// `(version, sql)` pairs, in application order. Adding a migration means
/// appending a new `(N+1, include_str!(...))` entry; existing entries are
/// never edited once released.
const MIGRATIONS: &[(&str, &str)] = &[("0001", include_str!("migrations/0001_init.sql"))];

/// Applies any migrations not yet recorded in `schema_migrations`, in a
/// single transaction per migration.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
    )
    .context("creating schema_migrations bookkeeping table")?;

    for (version, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
                [version],
                |row| row.get(0),
            )
            .context("checking schema_migrations")?;
        if already_applied {
            continue;
        }

        let tx = conn.transaction().context("opening migration transaction")?;
        tx.execute_batch(sql)
            .with_context(|| format!("applying migration {version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("recording migration {version}"))?;
        tx.commit().context("committing migration transaction")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn core_tables_exist_after_migration() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        for table in [
            "accounts",
            "transactions",
            "categories",
            "category_map",
            "commitments",
            "scheduled_inflows",
            "key_spend_events",
            "account_anchors",
            "forecast_snapshots",
            "source_cursors",
            "ingest_audits",
            "alerts",
        ] {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert!(exists, "expected table {table} to exist");
        }
    }
}
