//! Builds the variable-spend daily outflow series the Blended Overlay
//! (spec §4.7) feeds into `forecast::compute_daily_stats` /
//! `compute_weekday_multipliers`. Reuses the same payee/amount heuristics
//! `alerts::evaluate_large_unplanned_debits` already applies to recognize a
//! transaction as "matches a known commitment/inflow", since both problems
//! are really the same question: is this debit already accounted for?

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::{schedule, transactions};
use crate::error::Result;
use crate::forecast::DailyOutflow;

const TRANSFER_PAYEE_MARKERS: &[&str] = &["transfer", "xfer"];

fn looks_like_transfer(payee: &str) -> bool {
    let lower = payee.to_ascii_lowercase();
    TRANSFER_PAYEE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Returns the contiguous daily variable-spend series over
/// `[window_start, window_end]`, one entry per day including zero days.
/// Excludes income, transfers, and any cleared debit whose magnitude is
/// within `amount_tolerance_cents` of a configured commitment or scheduled
/// inflow.
pub fn historical_daily_outflows(
    conn: &Connection,
    window_start: NaiveDate,
    window_end: NaiveDate,
    amount_tolerance_cents: i64,
) -> Result<Vec<DailyOutflow>> {
    let transactions = transactions::list_in_range(conn, None, window_start, window_end)?;
    let commitments = schedule::list_commitments(conn)?;
    let inflows = schedule::list_scheduled_inflows(conn)?;

    let mut by_day: std::collections::HashMap<NaiveDate, i64> = std::collections::HashMap::new();
    for txn in &transactions {
        if !txn.is_cleared || txn.amount_cents >= 0 {
            continue;
        }
        if looks_like_transfer(&txn.payee) {
            continue;
        }
        let magnitude = txn.amount_cents.unsigned_abs() as i64;
        // Matched within tolerance rather than by exact equality: a real
        // charge can differ from the configured amount by a few cents
        // (the same drift commitment-drift detection watches for) and
        // should still be recognized as "already accounted for".
        let matches_known = commitments.iter().any(|c| (c.amount_cents - magnitude).abs() <= amount_tolerance_cents)
            || inflows.iter().any(|i| (i.amount_cents - magnitude).abs() <= amount_tolerance_cents);
        if matches_known {
            continue;
        }
        *by_day.entry(txn.posted_at).or_insert(0) += txn.amount_cents;
    }

    let mut series = Vec::new();
    let mut day = window_start;
    while day <= window_end {
        series.push(DailyOutflow { date: day, outflow_cents: by_day.get(&day).copied().unwrap_or(0) });
        day += chrono::Duration::days(1);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{accounts, open_memory_for_tests};

    fn insert(conn: &Connection, account_id: i64, date: NaiveDate, amount_cents: i64, payee: &str, external_id: &str) {
        let incoming = crate::db::transactions::IncomingTransaction {
            account_id,
            posted_at: date,
            amount_cents,
            payee: payee.into(),
            memo: None,
            external_id: external_id.into(),
            source: "csv".into(),
            category_id: None,
            is_cleared: true,
            import_meta: None,
        };
        crate::db::transactions::upsert_transaction(conn, &incoming).unwrap();
    }

    #[test]
    fn series_is_contiguous_and_includes_zero_days() {
        let conn = open_memory_for_tests();
        let account_id = accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        insert(&conn, account_id, d1, -4_200, "Grocery Store", "a1");

        let series = historical_daily_outflows(&conn, d1, d3, 500).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].outflow_cents, -4_200);
        assert_eq!(series[1].outflow_cents, 0);
        assert_eq!(series[2].outflow_cents, 0);
    }

    #[test]
    fn income_transfers_and_known_commitments_are_excluded() {
        let conn = open_memory_for_tests();
        let account_id = accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        insert(&conn, account_id, d1, 200_000, "Paycheck", "income");
        insert(&conn, account_id, d1, -10_000, "Internal Transfer", "xfer1");

        schedule::insert_commitment(
            &conn,
            &crate::models::Commitment {
                id: 0,
                name: "Rent".into(),
                amount_cents: 150_000,
                due_rule: "monthly:1".into(),
                next_due_date: d1,
                priority: 1,
                account_id,
                flexible_window_days: 0,
                category_id: None,
                commitment_type: "rent".into(),
                shift_policy: "AS_SCHEDULED".into(),
            },
        )
        .unwrap();
        insert(&conn, account_id, d1, -150_000, "Landlord LLC", "rent1");

        let series = historical_daily_outflows(&conn, d1, d1, 500).unwrap();
        assert_eq!(series[0].outflow_cents, 0);
    }

    #[test]
    fn a_debit_within_tolerance_of_a_commitment_amount_is_excluded() {
        let conn = open_memory_for_tests();
        let account_id = accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        let d1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        schedule::insert_commitment(
            &conn,
            &crate::models::Commitment {
                id: 0,
                name: "Rent".into(),
                amount_cents: 150_000,
                due_rule: "monthly:1".into(),
                next_due_date: d1,
                priority: 1,
                account_id,
                flexible_window_days: 0,
                category_id: None,
                commitment_type: "rent".into(),
                shift_policy: "AS_SCHEDULED".into(),
            },
        )
        .unwrap();
        insert(&conn, account_id, d1, -150_050, "Landlord LLC", "rent-near");

        let series = historical_daily_outflows(&conn, d1, d1, 500).unwrap();
        assert_eq!(series[0].outflow_cents, 0);
    }
}
