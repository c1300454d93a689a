use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::Account;

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Account>> {
    conn.query_row(
        "SELECT id, name, account_type, currency, is_active FROM accounts WHERE name = ?1",
        params![name],
        row_to_account,
    )
    .optional()
    .context("looking up account by name")
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Account>> {
    conn.query_row(
        "SELECT id, name, account_type, currency, is_active FROM accounts WHERE id = ?1",
        params![id],
        row_to_account,
    )
    .optional()
    .context("looking up account by id")
}

/// Upserts an account by name: creates it on first sight (Ingestor
/// responsibility), never deletes it. Returns the account id.
pub fn upsert_by_name(
    conn: &Connection,
    name: &str,
    account_type: &str,
    currency: &str,
) -> Result<i64> {
    if let Some(existing) = find_by_name(conn, name)? {
        return Ok(existing.id);
    }
    conn.execute(
        "INSERT INTO accounts (name, account_type, currency, is_active) VALUES (?1, ?2, ?3, 1)",
        params![name, account_type, currency],
    )
    .context("inserting account")?;
    Ok(conn.last_insert_rowid())
}

pub fn list_active(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, account_type, currency, is_active FROM accounts WHERE is_active = 1 ORDER BY id",
    )?;
    let rows = stmt.query_map([], row_to_account)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("listing active accounts")
}

pub fn list_all(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt =
        conn.prepare("SELECT id, name, account_type, currency, is_active FROM accounts ORDER BY id")?;
    let rows = stmt.query_map([], row_to_account)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("listing accounts")
}

pub fn deactivate(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("UPDATE accounts SET is_active = 0 WHERE id = ?1", params![id])
        .context("deactivating account")?;
    Ok(())
}

fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        account_type: row.get(2)?,
        currency: row.get(3)?,
        is_active: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_for_tests;

    #[test]
    fn upsert_by_name_creates_once_and_is_stable_on_repeat() {
        let conn = open_memory_for_tests();
        let id1 = upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        let id2 = upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(list_all(&conn).unwrap().len(), 1);
    }

    #[test]
    fn deactivate_keeps_the_row_but_hides_it_from_active_list() {
        let conn = open_memory_for_tests();
        let id = upsert_by_name(&conn, "Old Account", "checking", "USD").unwrap();
        deactivate(&conn, id).unwrap();
        assert!(list_active(&conn).unwrap().is_empty());
        assert_eq!(list_all(&conn).unwrap().len(), 1);
    }
}
