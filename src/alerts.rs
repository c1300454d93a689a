//! Alert evaluation (spec §4.9): threshold breach, large unplanned debit,
//! and commitment drift, each emitted through `db::alerts::upsert` so
//! dedup-by-`(type, dedupe_key)` is enforced at the store layer.

use chrono::Utc;
use rusqlite::Connection;

use crate::config::Tunables;
use crate::db::{alerts as alerts_db, schedule, snapshots, transactions};
use crate::error::Result;
use crate::models::{Account, AccountAnchor};

const THRESHOLD_BREACH: &str = "threshold_breach";
const LARGE_UNPLANNED_DEBIT: &str = "large_unplanned_debit";
const COMMITMENT_DRIFT: &str = "commitment_drift";

/// Large-unplanned-debit magnitude floor in cents, absent a per-account
/// override. Chosen well above typical grocery/gas variable spend so it
/// only fires on genuinely unusual debits.
pub const DEFAULT_LARGE_DEBIT_THRESHOLD_CENTS: i64 = 50_000;

/// Runs every alert check against the latest two snapshots and the most
/// recent transactions. Returns how many alerts were newly created (as
/// opposed to updated-in-place) for logging/telemetry.
pub fn evaluate(
    conn: &Connection,
    anchors: &[AccountAnchor],
    overdraft_thresholds: &std::collections::HashMap<String, i64>,
    accounts_by_id: &std::collections::HashMap<i64, Account>,
    tunables: &Tunables,
) -> Result<usize> {
    let mut created = 0usize;
    created += evaluate_threshold_breach(conn, anchors, overdraft_thresholds)?;
    created += evaluate_large_unplanned_debits(conn, accounts_by_id, tunables)?;
    created += evaluate_commitment_drift(conn, tunables)?;
    Ok(created)
}

fn evaluate_threshold_breach(
    conn: &Connection,
    anchors: &[AccountAnchor],
    overdraft_thresholds: &std::collections::HashMap<String, i64>,
) -> Result<usize> {
    let mut created = 0usize;
    let Some(latest) = snapshots::latest(conn)? else {
        return Ok(0);
    };
    let previous = snapshots::second_latest(conn)?;

    if let Some(previous) = previous {
        let drop = previous.min_balance_cents - latest.min_balance_cents;
        let default_threshold = overdraft_thresholds.get("default").copied().unwrap_or(10_000);
        if drop > default_threshold {
            let is_new = alerts_db::upsert(
                conn,
                THRESHOLD_BREACH,
                &format!("snapshot-{}", latest.id),
                "warning",
                "Projected minimum balance dropped",
                &format!(
                    "Minimum balance fell from {} to {} cents, a drop of {} cents.",
                    previous.min_balance_cents, latest.min_balance_cents, drop
                ),
                None,
            )?;
            if is_new {
                created += 1;
            }
        }
    }

    for anchor in anchors {
        if let Some(floor) = anchor.min_floor_cents {
            if latest.min_balance_cents < floor {
                let is_new = alerts_db::upsert(
                    conn,
                    THRESHOLD_BREACH,
                    &format!("anchor-{}-{}", anchor.account_id, latest.id),
                    "critical",
                    "Projected balance breaches the configured floor",
                    &format!(
                        "Account {} is projected to reach {} cents, below its floor of {} cents.",
                        anchor.account_id, latest.min_balance_cents, floor
                    ),
                    None,
                )?;
                if is_new {
                    created += 1;
                }
            }
        }
    }

    Ok(created)
}

fn evaluate_large_unplanned_debits(
    conn: &Connection,
    accounts_by_id: &std::collections::HashMap<i64, Account>,
    tunables: &Tunables,
) -> Result<usize> {
    let mut created = 0usize;
    let today = Utc::now().date_naive();
    let lookback = today - chrono::Duration::days(3);
    let recent = transactions::list_in_range(conn, None, lookback, today)?;
    let commitments = schedule::list_commitments(conn)?;
    let inflows = schedule::list_scheduled_inflows(conn)?;
    let tolerance = tunables.commitment_drift_amount_tolerance_cents;

    for txn in &recent {
        if !txn.is_cleared || txn.amount_cents >= 0 {
            continue;
        }
        let magnitude = txn.amount_cents.unsigned_abs() as i64;
        if magnitude < DEFAULT_LARGE_DEBIT_THRESHOLD_CENTS {
            continue;
        }
        // A real charge rarely lands on a commitment's configured amount to
        // the cent (that drift is exactly what commitment-drift detection
        // exists to catch), so match within the same tolerance rather than
        // requiring equality.
        let matches_known = commitments.iter().any(|c| (c.amount_cents - magnitude).abs() <= tolerance)
            || inflows.iter().any(|i| (i.amount_cents - magnitude).abs() <= tolerance);
        if matches_known {
            continue;
        }
        let account_name = accounts_by_id
            .get(&txn.account_id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| txn.account_id.to_string());
        let is_new = alerts_db::upsert(
            conn,
            LARGE_UNPLANNED_DEBIT,
            &txn.idempotency_key,
            "warning",
            "Large unplanned debit",
            &format!("{} charged {} cents on {} with no matching commitment.", account_name, magnitude, txn.posted_at),
            Some(&txn.payee),
        )?;
        if is_new {
            created += 1;
        }
    }
    Ok(created)
}

/// A commitment "drifts" when the transactions that appear to satisfy it
/// (same payee-adjacent category, within the due-date tolerance) diverge in
/// amount or date from the configured values for `commitment_drift_cycles`
/// consecutive occurrences.
fn evaluate_commitment_drift(conn: &Connection, tunables: &Tunables) -> Result<usize> {
    let mut created = 0usize;
    let commitments = schedule::list_commitments(conn)?;

    for c in &commitments {
        let Some(category_id) = c.category_id else { continue };
        let window_start = c.next_due_date - chrono::Duration::days(tunables.commitment_drift_cycles as i64 * 45);
        let window_end = c.next_due_date + chrono::Duration::days(tunables.commitment_drift_date_tolerance_days);
        let candidates = transactions::list_by_category_in_range(conn, category_id, window_start, window_end)?;

        let drifted_cycles = candidates
            .iter()
            .filter(|t| {
                let amount_drift = (t.amount_cents.unsigned_abs() as i64 - c.amount_cents).abs();
                let date_drift = (t.posted_at - c.next_due_date).num_days().abs();
                amount_drift > tunables.commitment_drift_amount_tolerance_cents
                    || date_drift > tunables.commitment_drift_date_tolerance_days
            })
            .count();

        if drifted_cycles as u32 >= tunables.commitment_drift_cycles {
            let proposed_amount = average_amount(&candidates).unwrap_or(c.amount_cents);
            let is_new = alerts_db::upsert(
                conn,
                COMMITMENT_DRIFT,
                &format!("commitment-{}", c.id),
                "info",
                "Commitment amount may need updating",
                &format!(
                    "\"{}\" has drifted from its configured {} cents for {} consecutive cycles; observed average is {} cents.",
                    c.name, c.amount_cents, drifted_cycles, proposed_amount
                ),
                Some(&format!("{{\"suggested_amount_cents\":{}}}", proposed_amount)),
            )?;
            if is_new {
                created += 1;
            }
        }
    }
    Ok(created)
}

fn average_amount(transactions: &[crate::models::Transaction]) -> Option<i64> {
    if transactions.is_empty() {
        return None;
    }
    let total: i64 = transactions.iter().map(|t| t.amount_cents.unsigned_abs() as i64).sum();
    Some(total / transactions.len() as i64)
}
