use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Commitment, KeySpendEvent, ScheduledInflow};

pub fn list_commitments(conn: &Connection) -> Result<Vec<Commitment>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, amount_cents, due_rule, next_due_date, priority, account_id, flexible_window_days, category_id, commitment_type, shift_policy FROM commitments ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        let next_due: String = row.get(4)?;
        Ok(Commitment {
            id: row.get(0)?,
            name: row.get(1)?,
            amount_cents: row.get(2)?,
            due_rule: row.get(3)?,
            next_due_date: NaiveDate::parse_from_str(&next_due, "%Y-%m-%d").unwrap(),
            priority: row.get(5)?,
            account_id: row.get(6)?,
            flexible_window_days: row.get(7)?,
            category_id: row.get(8)?,
            commitment_type: row.get(9)?,
            shift_policy: row.get(10)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("listing commitments")
}

pub fn insert_commitment(conn: &Connection, c: &Commitment) -> Result<i64> {
    conn.execute(
        "INSERT INTO commitments (name, amount_cents, due_rule, next_due_date, priority, account_id, flexible_window_days, category_id, commitment_type, shift_policy)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            c.name, c.amount_cents, c.due_rule, c.next_due_date.to_string(), c.priority,
            c.account_id, c.flexible_window_days, c.category_id, c.commitment_type, c.shift_policy
        ],
    ).context("inserting commitment")?;
    Ok(conn.last_insert_rowid())
}

pub fn update_commitment_amount_and_date(
    conn: &Connection,
    id: i64,
    amount_cents: i64,
    next_due_date: NaiveDate,
) -> Result<()> {
    conn.execute(
        "UPDATE commitments SET amount_cents = ?1, next_due_date = ?2 WHERE id = ?3",
        params![amount_cents, next_due_date.to_string(), id],
    )
    .context("updating commitment")?;
    Ok(())
}

pub fn list_scheduled_inflows(conn: &Connection) -> Result<Vec<ScheduledInflow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, amount_cents, due_rule, next_due_date, account_id, inflow_type FROM scheduled_inflows ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        let next_due: String = row.get(4)?;
        Ok(ScheduledInflow {
            id: row.get(0)?,
            name: row.get(1)?,
            amount_cents: row.get(2)?,
            due_rule: row.get(3)?,
            next_due_date: NaiveDate::parse_from_str(&next_due, "%Y-%m-%d").unwrap(),
            account_id: row.get(5)?,
            inflow_type: row.get(6)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("listing scheduled inflows")
}

pub fn insert_scheduled_inflow(conn: &Connection, i: &ScheduledInflow) -> Result<i64> {
    conn.execute(
        "INSERT INTO scheduled_inflows (name, amount_cents, due_rule, next_due_date, account_id, inflow_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![i.name, i.amount_cents, i.due_rule, i.next_due_date.to_string(), i.account_id, i.inflow_type],
    ).context("inserting scheduled inflow")?;
    Ok(conn.last_insert_rowid())
}

pub fn list_key_spend_events(conn: &Connection) -> Result<Vec<KeySpendEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, event_date, repeat_rule, planned_amount_cents, category_id, lead_time_days, shift_policy, account_id FROM key_spend_events ORDER BY id",
    )?;
    let rows = stmt.query_map([], row_to_key_spend_event)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().context("listing key spend events")
}

pub fn get_key_spend_event(conn: &Connection, id: i64) -> Result<Option<KeySpendEvent>> {
    conn.query_row(
        "SELECT id, name, event_date, repeat_rule, planned_amount_cents, category_id, lead_time_days, shift_policy, account_id FROM key_spend_events WHERE id = ?1",
        params![id],
        row_to_key_spend_event,
    )
    .optional()
    .context("looking up key spend event")
}

/// Upserts a key spend event (insert when `id` is `None`/unknown, else
/// replace in place) — backs `POST /key-events`.
pub fn upsert_key_spend_event(conn: &Connection, e: &KeySpendEvent) -> Result<i64> {
    if e.id > 0 && get_key_spend_event(conn, e.id)?.is_some() {
        conn.execute(
            "UPDATE key_spend_events SET name=?1, event_date=?2, repeat_rule=?3, planned_amount_cents=?4, category_id=?5, lead_time_days=?6, shift_policy=?7, account_id=?8 WHERE id=?9",
            params![e.name, e.event_date.to_string(), e.repeat_rule, e.planned_amount_cents, e.category_id, e.lead_time_days, e.shift_policy, e.account_id, e.id],
        ).context("updating key spend event")?;
        Ok(e.id)
    } else {
        conn.execute(
            "INSERT INTO key_spend_events (name, event_date, repeat_rule, planned_amount_cents, category_id, lead_time_days, shift_policy, account_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![e.name, e.event_date.to_string(), e.repeat_rule, e.planned_amount_cents, e.category_id, e.lead_time_days, e.shift_policy, e.account_id],
        ).context("inserting key spend event")?;
        Ok(conn.last_insert_rowid())
    }
}

pub fn delete_key_spend_event(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn
        .execute("DELETE FROM key_spend_events WHERE id = ?1", params![id])
        .context("deleting key spend event")?;
    Ok(changed > 0)
}

fn row_to_key_spend_event(row: &rusqlite::Row) -> rusqlite::Result<KeySpendEvent> {
    let event_date: String = row.get(2)?;
    Ok(KeySpendEvent {
        id: row.get(0)?,
        name: row.get(1)?,
        event_date: NaiveDate::parse_from_str(&event_date, "%Y-%m-%d").unwrap(),
        repeat_rule: row.get(3)?,
        planned_amount_cents: row.get(4)?,
        category_id: row.get(5)?,
        lead_time_days: row.get(6)?,
        shift_policy: row.get(7)?,
        account_id: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{accounts, open_memory_for_tests};

    #[test]
    fn upsert_key_spend_event_inserts_then_updates_in_place() {
        let conn = open_memory_for_tests();
        let account_id = accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        let mut event = KeySpendEvent {
            id: 0,
            name: "Birthday".into(),
            event_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            repeat_rule: None,
            planned_amount_cents: 5000,
            category_id: None,
            lead_time_days: 14,
            shift_policy: "AS_SCHEDULED".into(),
            account_id: Some(account_id),
        };
        let id = upsert_key_spend_event(&conn, &event).unwrap();
        event.id = id;
        event.planned_amount_cents = 7500;
        upsert_key_spend_event(&conn, &event).unwrap();

        assert_eq!(list_key_spend_events(&conn).unwrap().len(), 1);
        let stored = get_key_spend_event(&conn, id).unwrap().unwrap();
        assert_eq!(stored.planned_amount_cents, 7500);
    }

    #[test]
    fn delete_key_spend_event_removes_the_row() {
        let conn = open_memory_for_tests();
        let account_id = accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        let event = KeySpendEvent {
            id: 0,
            name: "Holiday".into(),
            event_date: NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(),
            repeat_rule: None,
            planned_amount_cents: 20000,
            category_id: None,
            lead_time_days: 30,
            shift_policy: "AS_SCHEDULED".into(),
            account_id: Some(account_id),
        };
        let id = upsert_key_spend_event(&conn, &event).unwrap();
        assert!(delete_key_spend_event(&conn, id).unwrap());
        assert!(get_key_spend_event(&conn, id).unwrap().is_none());
    }
}
