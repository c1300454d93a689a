use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::AccountAnchor;

pub fn get(conn: &Connection, account_id: i64) -> Result<Option<AccountAnchor>> {
    conn.query_row(
        "SELECT account_id, anchor_date, anchor_balance_cents, min_floor_cents FROM account_anchors WHERE account_id = ?1",
        params![account_id],
        row_to_anchor,
    )
    .optional()
    .context("looking up account anchor")
}

pub fn list_all(conn: &Connection) -> Result<Vec<AccountAnchor>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, anchor_date, anchor_balance_cents, min_floor_cents FROM account_anchors ORDER BY account_id",
    )?;
    let rows = stmt.query_map([], row_to_anchor)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("listing account anchors")
}

/// Upserts the single anchor row for an account (`PUT /accounts/{id}/anchor`).
pub fn upsert(conn: &Connection, anchor: &AccountAnchor) -> Result<()> {
    conn.execute(
        "INSERT INTO account_anchors (account_id, anchor_date, anchor_balance_cents, min_floor_cents)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(account_id) DO UPDATE SET
            anchor_date = excluded.anchor_date,
            anchor_balance_cents = excluded.anchor_balance_cents,
            min_floor_cents = excluded.min_floor_cents",
        params![
            anchor.account_id,
            anchor.anchor_date.to_string(),
            anchor.anchor_balance_cents,
            anchor.min_floor_cents
        ],
    )
    .context("upserting account anchor")?;
    Ok(())
}

fn row_to_anchor(row: &rusqlite::Row) -> rusqlite::Result<AccountAnchor> {
    let anchor_date: String = row.get(1)?;
    Ok(AccountAnchor {
        account_id: row.get(0)?,
        anchor_date: chrono::NaiveDate::parse_from_str(&anchor_date, "%Y-%m-%d").unwrap(),
        anchor_balance_cents: row.get(2)?,
        min_floor_cents: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{accounts, open_memory_for_tests};
    use chrono::NaiveDate;

    #[test]
    fn upsert_anchor_replaces_in_place() {
        let conn = open_memory_for_tests();
        let account_id = accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        let mut anchor = AccountAnchor {
            account_id,
            anchor_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            anchor_balance_cents: 200_000,
            min_floor_cents: None,
        };
        upsert(&conn, &anchor).unwrap();
        anchor.anchor_balance_cents = 250_000;
        upsert(&conn, &anchor).unwrap();

        assert_eq!(list_all(&conn).unwrap().len(), 1);
        assert_eq!(get(&conn, account_id).unwrap().unwrap().anchor_balance_cents, 250_000);
    }
}
