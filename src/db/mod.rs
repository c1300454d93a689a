//! Store: an embedded single-file SQLite database. All writes to shared
//! mutable state (cursor advancement, snapshot insertion, alert dedup,
//! anchor upsert) go through `rusqlite` transactions, giving
//! `SERIALIZABLE`-equivalent semantics for free under SQLite's
//! single-writer model.

pub mod accounts;
pub mod alerts;
pub mod anchors;
pub mod categories;
pub mod cursors;
pub mod ingest_audits;
pub mod migrations;
pub mod question_aliases;
pub mod schedule;
pub mod snapshots;
pub mod transactions;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Default database path (`~/.runway/data.db`), used when `DB_PATH` is unset.
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let dir = PathBuf::from(home).join(".runway");
    std::fs::create_dir_all(&dir).context("failed to create ~/.runway directory")?;
    Ok(dir.join("data.db"))
}

/// Opens the store and applies any pending migrations.
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    let mut conn = Connection::open(path)
        .with_context(|| format!("opening database at {}", path.display()))?;
    conn.pragma_update(None, "foreign_keys", true)?;
    migrations::run_migrations(&mut conn)?;
    ensure_holding_category(&conn)?;
    info!(path = %path.display(), "database ready");
    Ok(conn)
}

/// Ensures the singleton internal "Holding" category exists, creating it on
/// first need. Idempotent: looks the row up before inserting.
fn ensure_holding_category(conn: &Connection) -> Result<()> {
    categories::ensure_internal_category(conn, crate::models::Category::HOLDING_NAME)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn open_memory_for_tests() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    migrations::run_migrations(&mut conn).unwrap();
    ensure_holding_category(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_db_creates_parent_directories_and_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");
        let conn = open_db(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM categories WHERE name = 'Holding'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn opening_twice_does_not_duplicate_the_holding_category() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        open_db(&path).unwrap();
        let conn = open_db(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM categories WHERE name = 'Holding'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
