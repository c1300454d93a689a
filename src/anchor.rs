//! Anchor Resolver: a pure function of stored state computing the opening
//! balance for any date across an account set, using optional per-account
//! ground-truth anchors plus cleared-transaction deltas.

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::{anchors, transactions};
use crate::error::Result;

/// `Opening(as_of, {account_id})` per account §4.3:
/// - with an anchor dated `d0`/`B0`: `B0 + cleared(d0, as_of]` when `as_of >= d0`,
///   `B0 - cleared(as_of, d0]` when `as_of < d0`.
/// - without an anchor: `cleared(<= as_of)`.
pub fn opening_balance_for_account(conn: &Connection, account_id: i64, as_of: NaiveDate) -> Result<i64> {
    match anchors::get(conn, account_id)? {
        Some(anchor) => {
            if as_of >= anchor.anchor_date {
                let delta = transactions::sum_cleared_after_through(conn, account_id, anchor.anchor_date, as_of)?;
                Ok(anchor.anchor_balance_cents + delta)
            } else {
                let delta = transactions::sum_cleared_after_through(conn, account_id, as_of, anchor.anchor_date)?;
                Ok(anchor.anchor_balance_cents - delta)
            }
        }
        None => transactions::sum_cleared_through(conn, account_id, as_of),
    }
}

/// Sum of `opening_balance_for_account` across `account_ids`.
pub fn opening_balance(conn: &Connection, account_ids: &[i64], as_of: NaiveDate) -> Result<i64> {
    let mut total = 0i64;
    for &id in account_ids {
        total += opening_balance_for_account(conn, id, as_of)?;
    }
    Ok(total)
}
