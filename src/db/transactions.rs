use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::Transaction;

/// A transaction as seen from the ingest source, before the idempotency key
/// or internal id are assigned.
#[derive(Debug, Clone)]
pub struct IncomingTransaction {
    pub account_id: i64,
    pub posted_at: NaiveDate,
    pub amount_cents: i64,
    pub payee: String,
    pub memo: Option<String>,
    pub external_id: String,
    pub source: String,
    pub category_id: Option<i64>,
    pub is_cleared: bool,
    pub import_meta: Option<String>,
}

/// Upsert-only: on conflict, only `category_id`, `is_cleared` and
/// `import_meta` change. The immutable ledger fields (amount, date, payee,
/// account) are never overwritten by a re-ingest, since they're part of the
/// idempotency key or fixed at insert time.
///
/// Returns `true` if a new row was inserted, `false` if an existing row was
/// updated (used by the ingestor to compute `rows_upserted`... every
/// touched row counts, so callers should count this call regardless of the
/// return value; the bool is exposed for auditing/tests).
pub fn upsert_transaction(conn: &Connection, incoming: &IncomingTransaction) -> Result<bool> {
    let key = Transaction::compute_idempotency_key(
        &incoming.source,
        &incoming.external_id,
        incoming.posted_at,
        incoming.amount_cents,
    );

    let existed: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE idempotency_key = ?1)",
            params![key],
            |row| row.get(0),
        )
        .context("checking transaction existence")?;

    conn.execute(
        "INSERT INTO transactions
            (idempotency_key, account_id, posted_at, amount_cents, payee, memo, external_id, source, category_id, is_cleared, import_meta)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(idempotency_key) DO UPDATE SET
            category_id = COALESCE(excluded.category_id, transactions.category_id),
            is_cleared = excluded.is_cleared,
            import_meta = excluded.import_meta",
        params![
            key,
            incoming.account_id,
            incoming.posted_at.to_string(),
            incoming.amount_cents,
            incoming.payee,
            incoming.memo,
            incoming.external_id,
            incoming.source,
            incoming.category_id,
            incoming.is_cleared,
            incoming.import_meta,
        ],
    )
    .context("upserting transaction")?;

    Ok(!existed)
}

pub fn get_by_idempotency_key(conn: &Connection, key: &str) -> Result<Option<Transaction>> {
    conn.query_row(
        "SELECT id, idempotency_key, account_id, posted_at, amount_cents, payee, memo, external_id, source, category_id, is_cleared, import_meta
         FROM transactions WHERE idempotency_key = ?1",
        params![key],
        row_to_transaction,
    )
    .optional()
    .context("looking up transaction by idempotency key")
}

pub fn count_all(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
        .context("counting transactions")
}

/// Sum of cleared amounts for an account strictly within `(from, to]`
/// (exclusive start, inclusive end) — used by the Anchor Resolver when
/// `as_of >= anchor_date`.
pub fn sum_cleared_after_through(
    conn: &Connection,
    account_id: i64,
    from_exclusive: NaiveDate,
    to_inclusive: NaiveDate,
) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions
         WHERE account_id = ?1 AND is_cleared = 1 AND posted_at > ?2 AND posted_at <= ?3",
        params![account_id, from_exclusive.to_string(), to_inclusive.to_string()],
        |row| row.get(0),
    )
    .context("summing cleared transactions in range")
}

/// Sum of cleared amounts for an account up to and including `as_of` — used
/// by the Anchor Resolver when no anchor exists for the account.
pub fn sum_cleared_through(conn: &Connection, account_id: i64, as_of: NaiveDate) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions
         WHERE account_id = ?1 AND is_cleared = 1 AND posted_at <= ?2",
        params![account_id, as_of.to_string()],
        |row| row.get(0),
    )
    .context("summing cleared transactions through date")
}

pub fn list_in_range(
    conn: &Connection,
    account_ids: Option<&[i64]>,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, idempotency_key, account_id, posted_at, amount_cents, payee, memo, external_id, source, category_id, is_cleared, import_meta
         FROM transactions WHERE posted_at >= ?1 AND posted_at <= ?2 ORDER BY posted_at, id",
    )?;
    let rows = stmt.query_map(params![from.to_string(), to.to_string()], row_to_transaction)?;
    let mut all = rows.collect::<rusqlite::Result<Vec<_>>>().context("listing transactions")?;
    if let Some(ids) = account_ids {
        all.retain(|t| ids.contains(&t.account_id));
    }
    Ok(all)
}

pub fn list_by_category_in_range(
    conn: &Connection,
    category_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, idempotency_key, account_id, posted_at, amount_cents, payee, memo, external_id, source, category_id, is_cleared, import_meta
         FROM transactions WHERE category_id = ?1 AND posted_at >= ?2 AND posted_at <= ?3 ORDER BY posted_at, id",
    )?;
    let rows = stmt.query_map(
        params![category_id, from.to_string(), to.to_string()],
        row_to_transaction,
    )?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("listing transactions by category")
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let posted_at: String = row.get(3)?;
    Ok(Transaction {
        id: row.get(0)?,
        idempotency_key: row.get(1)?,
        account_id: row.get(2)?,
        posted_at: NaiveDate::parse_from_str(&posted_at, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?,
        amount_cents: row.get(4)?,
        payee: row.get(5)?,
        memo: row.get(6)?,
        external_id: row.get(7)?,
        source: row.get(8)?,
        category_id: row.get(9)?,
        is_cleared: row.get(10)?,
        import_meta: row.get(11)?,
    })
}
