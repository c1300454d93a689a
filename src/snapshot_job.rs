//! Snapshot & Digest Job (spec §4.8): runs synchronously post-ingest,
//! computes the deterministic forecast across the default horizon, persists
//! a `ForecastSnapshot`, and derives the compact digest the UI renders.

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::anchor;
use crate::calendar::{self, Entry};
use crate::clock::Clock;
use crate::db::{accounts, schedule, snapshots};
use crate::error::Result;
use crate::forecast::{self, ForecastSeries};

pub const HORIZON_DAYS: i64 = 120;
pub const TOP_COMMITMENTS_WINDOW_DAYS: i64 = 14;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub opening_balance_cents: i64,
    pub entries: Vec<Entry>,
    pub balances: std::collections::BTreeMap<NaiveDate, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCommitment {
    pub name: String,
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub current_balance_cents: i64,
    pub safe_to_spend_today_cents: i64,
    pub next_cliff_date: Option<NaiveDate>,
    pub min_balance_cents: i64,
    pub min_balance_date: NaiveDate,
    pub top_commitments: Vec<TopCommitment>,
    pub key_events_in_lead_window: Vec<Entry>,
    pub snapshot_created_at: chrono::DateTime<Utc>,
    pub stale: bool,
}

/// Computes the forecast across `[today, today + HORIZON_DAYS]` for all
/// active accounts and persists a `ForecastSnapshot` row. Returns the
/// snapshot id and the computed series. On any failure, no row is written
/// and the caller (the ingest runner) should leave the previous snapshot in
/// place per spec §4.8 point 5.
pub fn run(conn: &Connection, clock: &dyn Clock, buffer_floor_cents: i64) -> Result<(i64, ForecastSeries)> {
    let today = clock.today();
    let horizon_end = today + Duration::days(HORIZON_DAYS);

    let active_accounts = accounts::list_active(conn)?;
    let account_ids: Vec<i64> = active_accounts.iter().map(|a| a.id).collect();
    let opening = anchor::opening_balance(conn, &account_ids, today - Duration::days(1))?;

    let commitments = schedule::list_commitments(conn)?;
    let inflows = schedule::list_scheduled_inflows(conn)?;
    let key_events = schedule::list_key_spend_events(conn)?;
    let entries = calendar::expand(&commitments, &inflows, &key_events, today, horizon_end);

    let series = forecast::compute_balances(opening, &entries, today, horizon_end, buffer_floor_cents);

    let payload = SnapshotPayload {
        opening_balance_cents: opening,
        entries,
        balances: series.balances.clone(),
    };
    let payload_json = serde_json::to_string(&payload).map_err(|e| anyhow::anyhow!("serializing snapshot payload: {e}"))?;

    let id = snapshots::insert(
        conn,
        clock.now(),
        today,
        horizon_end,
        &payload_json,
        series.min_balance_cents,
        series.min_balance_date,
    )?;

    info!(
        snapshot_id = id,
        min_balance_cents = series.min_balance_cents,
        min_balance_date = %series.min_balance_date,
        "forecast snapshot recorded"
    );

    Ok((id, series))
}

/// Derives the digest from the latest persisted snapshot. If the most
/// recent snapshot is older than one day, `stale` is set and the UI is
/// expected to show the staleness indicator (spec §4.8 point 5, §7).
pub fn digest(conn: &Connection, clock: &dyn Clock, buffer_floor_cents: i64) -> Result<Option<Digest>> {
    let Some(snapshot) = snapshots::latest(conn)? else {
        return Ok(None);
    };

    let payload: SnapshotPayload = serde_json::from_str(&snapshot.payload)
        .map_err(|e| anyhow::anyhow!("deserializing snapshot payload: {e}"))?;

    let today = clock.today();
    let current_balance_cents = *payload
        .balances
        .get(&today)
        .unwrap_or(&payload.opening_balance_cents);

    // `safe_to_spend_today` re-applies `payload.entries` starting at `today`,
    // so its `opening_cents` must be the pre-today balance, not
    // `current_balance_cents` (which already includes today's entries) —
    // otherwise anything dated today is double-counted.
    let active_accounts = accounts::list_active(conn)?;
    let account_ids: Vec<i64> = active_accounts.iter().map(|a| a.id).collect();
    let opening_today = anchor::opening_balance(conn, &account_ids, today - Duration::days(1))?;

    let safe_to_spend_today_cents = forecast::safe_to_spend_today(
        opening_today,
        &payload.entries,
        today,
        snapshot.horizon_end,
        buffer_floor_cents,
    );

    let window_end = today + Duration::days(TOP_COMMITMENTS_WINDOW_DAYS);
    let commitments = schedule::list_commitments(conn)?;
    let mut top_commitments: Vec<TopCommitment> = payload
        .entries
        .iter()
        .filter(|e| matches!(e.entry_type, calendar::EntryType::Commitment) && e.date >= today && e.date <= window_end)
        .map(|e| {
            let priority = commitments
                .iter()
                .find(|c| c.id == e.source_id)
                .map(|c| c.priority)
                .unwrap_or(i32::MAX);
            TopCommitment { name: e.name.clone(), date: e.date, amount_cents: e.signed_amount_cents, priority }
        })
        .collect();
    top_commitments.sort_by(|a, b| a.date.cmp(&b.date).then(a.priority.cmp(&b.priority)));

    let key_events_in_lead_window = payload
        .entries
        .iter()
        .filter(|e| matches!(e.entry_type, calendar::EntryType::KeyEvent) && e.is_within_lead_window)
        .cloned()
        .collect();

    let stale = (clock.now() - snapshot.created_at) > Duration::days(1);
    if stale {
        warn!(snapshot_created_at = %snapshot.created_at, "serving stale snapshot");
    }

    Ok(Some(Digest {
        current_balance_cents,
        safe_to_spend_today_cents,
        next_cliff_date: if current_balance_cents <= buffer_floor_cents { Some(today) } else {
            payload.balances.iter().find(|(_, bal)| **bal <= buffer_floor_cents).map(|(d, _)| *d)
        },
        min_balance_cents: snapshot.min_balance_cents,
        min_balance_date: snapshot.min_balance_date,
        top_commitments,
        key_events_in_lead_window,
        snapshot_created_at: snapshot.created_at,
        stale,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::{accounts, open_memory_for_tests};
    use crate::models::AccountAnchor;

    #[test]
    fn run_persists_a_snapshot_and_digest_reads_it_back() {
        let conn = open_memory_for_tests();
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let clock = FixedClock::at_date(today);

        let account_id = accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        crate::db::anchors::upsert(
            &conn,
            &AccountAnchor { account_id, anchor_date: today, anchor_balance_cents: 200_000, min_floor_cents: None },
        )
        .unwrap();

        let (id, series) = run(&conn, &clock, 0).unwrap();
        assert!(id > 0);
        assert_eq!(series.opening_balance_cents, 200_000);

        let digest = digest(&conn, &clock, 0).unwrap().unwrap();
        assert_eq!(digest.current_balance_cents, 200_000);
        assert!(!digest.stale);
    }

    #[test]
    fn digest_is_none_before_any_snapshot_has_ever_run() {
        let conn = open_memory_for_tests();
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert!(digest(&conn, &clock, 0).unwrap().is_none());
    }

    #[test]
    fn safe_to_spend_today_does_not_double_count_an_entry_dated_today() {
        let conn = open_memory_for_tests();
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let clock = FixedClock::at_date(today);

        let account_id = accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        crate::db::anchors::upsert(
            &conn,
            &AccountAnchor {
                account_id,
                anchor_date: today - Duration::days(1),
                anchor_balance_cents: 200_000,
                min_floor_cents: None,
            },
        )
        .unwrap();
        crate::db::schedule::insert_commitment(
            &conn,
            &crate::models::Commitment {
                id: 0,
                name: "Rent".into(),
                amount_cents: 50_000,
                due_rule: format!("fixed:{today}"),
                next_due_date: today,
                priority: 1,
                account_id,
                flexible_window_days: 0,
                category_id: None,
                commitment_type: "rent".into(),
                shift_policy: "AS_SCHEDULED".into(),
            },
        )
        .unwrap();

        run(&conn, &clock, 0).unwrap();
        let digest = digest(&conn, &clock, 0).unwrap().unwrap();

        // Pre-today opening is 200000; today's rent entry (-50000) already
        // shows up in `payload.entries`, so the true safe-to-spend ceiling is
        // 200000 - 50000 = 150000, not 100000 (which double-counts rent by
        // starting from the post-rent `current_balance_cents`).
        assert_eq!(digest.current_balance_cents, 150_000);
        assert_eq!(digest.safe_to_spend_today_cents, 150_000);
    }

    #[test]
    fn digest_flags_stale_when_the_latest_snapshot_is_a_day_old() {
        let conn = open_memory_for_tests();
        let run_day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let run_clock = FixedClock::at_date(run_day);
        accounts::upsert_by_name(&conn, "Checking", "checking", "USD").unwrap();
        run(&conn, &run_clock, 0).unwrap();

        let later_clock = FixedClock::at_date(run_day + Duration::days(3));
        let digest = digest(&conn, &later_clock, 0).unwrap().unwrap();
        assert!(digest.stale);
    }
}
