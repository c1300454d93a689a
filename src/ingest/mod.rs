//! Ingestor (spec §4.1): pulls transactions from the upstream bookkeeping
//! service or a CSV export, upserts them idempotently, advances the
//! per-source cursor inside the same transaction as the final upsert batch,
//! and writes one `IngestAudit` row per run.

mod csv_import;
mod mapper;
mod upstream;

pub use csv_import::import_csv;
pub use mapper::sync_categories;
pub use upstream::{HttpUpstreamClient, UpstreamCategory, UpstreamClient, UpstreamTransaction};

use chrono::Utc;
use rusqlite::Connection;
use tracing::{error, info};

use crate::db::{accounts, categories, cursors, ingest_audits, transactions};
use crate::error::Result;
use crate::models::IngestStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Delta,
    Backfill { months: u32 },
}

/// Shifts an ISO-date cursor back one day so a delta fetch re-covers the day
/// it last advanced past (§4.1 clock-skew safety). `SourceCursor` is always
/// stored as the max `posted_at` seen in a run (an ISO date), but the
/// contract allows an opaque token too; anything that doesn't parse as a
/// date is passed through unchanged rather than rejected.
fn shift_cursor_back_a_day(last_cursor: &str) -> String {
    match chrono::NaiveDate::parse_from_str(last_cursor, "%Y-%m-%d") {
        Ok(date) => (date - chrono::Duration::days(1)).to_string(),
        Err(_) => last_cursor.to_string(),
    }
}

/// Runs one ingest invocation end to end: fetch, resolve category, upsert
/// transaction, advance cursor — the fetch+resolve happen outside the
/// transaction (I/O), the upsert batch + cursor advance happen inside a
/// single `rusqlite::Transaction` so a failure never leaves the cursor
/// pointing past un-upserted rows.
pub async fn run_delta_or_backfill(
    conn: &mut Connection,
    source: &str,
    client: &dyn UpstreamClient,
    mode: Mode,
) -> Result<i64> {
    let run_started_at = Utc::now();
    let cursor = cursors::get(conn, source)?;

    let fetch_result = match mode {
        Mode::Delta => {
            // Clock-skew safety (§4.1): re-fetch one day before the cursor;
            // duplicates are absorbed by the idempotency unique constraint.
            let since = cursor
                .as_ref()
                .map(|c| shift_cursor_back_a_day(&c.last_cursor))
                .unwrap_or_default();
            client.fetch_delta(&since).await
        }
        Mode::Backfill { months } => client.fetch_backfill(months).await,
    };

    let incoming = match fetch_result {
        Ok(rows) => rows,
        Err(e) => {
            error!(source, error = %e, "ingest fetch failed");
            ingest_audits::insert(
                conn,
                source,
                run_started_at,
                Utc::now(),
                0,
                IngestStatus::Failure,
                Some(&e.to_string()),
            )?;
            return Err(e);
        }
    };

    let new_cursor = incoming.iter().map(|t| t.posted_at.to_string()).max();

    let tx = conn.transaction()?;
    let mut rows_upserted = 0i64;
    for row in &incoming {
        let account_id = accounts::upsert_by_name(&tx, &row.account_name, &row.account_type, &row.currency)?;
        let category_id = categories::get_category_map(&tx, source, &row.external_category_id)?
            .map(|m| m.internal_category_id);

        let incoming_txn = transactions::IncomingTransaction {
            account_id,
            posted_at: row.posted_at,
            amount_cents: row.amount_cents,
            payee: row.payee.clone(),
            memo: row.memo.clone(),
            external_id: row.external_id.clone(),
            source: source.to_string(),
            category_id,
            is_cleared: row.is_cleared,
            import_meta: row.import_meta.clone(),
        };
        transactions::upsert_transaction(&tx, &incoming_txn)?;
        rows_upserted += 1;
    }

    if let Some(new_cursor) = new_cursor {
        if matches!(mode, Mode::Delta) {
            cursors::advance(&tx, source, &new_cursor)?;
        }
    }

    tx.commit()?;

    let audit_id = ingest_audits::insert(
        conn,
        source,
        run_started_at,
        Utc::now(),
        rows_upserted,
        IngestStatus::Success,
        None,
    )?;

    info!(source, rows_upserted, "ingest run complete");
    Ok(audit_id)
}

/// CSV import never advances a `SourceCursor` (the spec scopes cursors to
/// delta/backfill modes only) but still writes an audit row.
pub fn run_csv_import(
    conn: &mut Connection,
    source: &str,
    path: &std::path::Path,
    account_name: &str,
    account_type: &str,
    currency: &str,
) -> Result<i64> {
    let run_started_at = Utc::now();
    let rows = match csv_import::import_csv(path) {
        Ok(rows) => rows,
        Err(e) => {
            ingest_audits::insert(
                conn,
                source,
                run_started_at,
                Utc::now(),
                0,
                IngestStatus::Failure,
                Some(&e.to_string()),
            )?;
            return Err(e);
        }
    };

    let tx = conn.transaction()?;
    let account_id = accounts::upsert_by_name(&tx, account_name, account_type, currency)?;
    let mut rows_upserted = 0i64;
    for row in &rows {
        let incoming_txn = transactions::IncomingTransaction {
            account_id,
            posted_at: row.posted_at,
            amount_cents: row.amount_cents,
            payee: row.payee.clone(),
            memo: row.memo.clone(),
            external_id: row.external_id.clone(),
            source: source.to_string(),
            category_id: None,
            is_cleared: true,
            import_meta: None,
        };
        transactions::upsert_transaction(&tx, &incoming_txn)?;
        rows_upserted += 1;
    }
    tx.commit()?;

    let audit_id = ingest_audits::insert(
        conn,
        source,
        run_started_at,
        Utc::now(),
        rows_upserted,
        IngestStatus::Success,
        None,
    )?;
    info!(source, rows_upserted, "csv import complete");
    Ok(audit_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_for_tests;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FakeUpstream {
        rows: Vec<UpstreamTransaction>,
    }

    #[async_trait]
    impl UpstreamClient for FakeUpstream {
        async fn fetch_delta(&self, _since: &str) -> Result<Vec<UpstreamTransaction>> {
            Ok(self.rows.clone())
        }

        async fn fetch_backfill(&self, _months: u32) -> Result<Vec<UpstreamTransaction>> {
            Ok(self.rows.clone())
        }

        async fn fetch_categories(&self) -> Result<Vec<UpstreamCategory>> {
            Ok(vec![])
        }
    }

    fn sample_row() -> UpstreamTransaction {
        UpstreamTransaction {
            account_name: "Checking".into(),
            account_type: "checking".into(),
            currency: "USD".into(),
            posted_at: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            amount_cents: -1_200,
            payee: "Acme".into(),
            memo: None,
            external_id: "ext-1".into(),
            external_category_id: "cat-1".into(),
            is_cleared: true,
            import_meta: None,
        }
    }

    #[tokio::test]
    async fn running_delta_ingest_twice_is_idempotent() {
        let mut conn = open_memory_for_tests();
        let upstream = FakeUpstream { rows: vec![sample_row()] };

        run_delta_or_backfill(&mut conn, "fake", &upstream, Mode::Delta).await.unwrap();
        run_delta_or_backfill(&mut conn, "fake", &upstream, Mode::Delta).await.unwrap();

        assert_eq!(transactions::count_all(&conn).unwrap(), 1);
        assert_eq!(ingest_audits::list_for_source(&conn, "fake").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cursor_advances_only_after_a_successful_commit() {
        let mut conn = open_memory_for_tests();
        let upstream = FakeUpstream { rows: vec![sample_row()] };

        run_delta_or_backfill(&mut conn, "fake", &upstream, Mode::Delta).await.unwrap();

        let cursor = cursors::get(&conn, "fake").unwrap().unwrap();
        assert_eq!(cursor.last_cursor, "2025-01-01");
    }

    #[test]
    fn shifting_an_iso_date_cursor_moves_it_back_one_day() {
        assert_eq!(shift_cursor_back_a_day("2025-01-02"), "2025-01-01");
    }

    #[test]
    fn shifting_an_opaque_cursor_token_passes_it_through_unchanged() {
        assert_eq!(shift_cursor_back_a_day("opaque-token-7"), "opaque-token-7");
    }

    struct RecordingUpstream {
        rows: Vec<UpstreamTransaction>,
        seen_since: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl UpstreamClient for RecordingUpstream {
        async fn fetch_delta(&self, since: &str) -> Result<Vec<UpstreamTransaction>> {
            *self.seen_since.lock().unwrap() = Some(since.to_string());
            Ok(self.rows.clone())
        }

        async fn fetch_backfill(&self, _months: u32) -> Result<Vec<UpstreamTransaction>> {
            Ok(self.rows.clone())
        }

        async fn fetch_categories(&self) -> Result<Vec<UpstreamCategory>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn a_second_delta_run_re_fetches_one_day_before_the_stored_cursor() {
        let mut conn = open_memory_for_tests();
        let first = RecordingUpstream { rows: vec![sample_row()], seen_since: std::sync::Mutex::new(None) };
        run_delta_or_backfill(&mut conn, "fake", &first, Mode::Delta).await.unwrap();

        let second = RecordingUpstream { rows: vec![], seen_since: std::sync::Mutex::new(None) };
        run_delta_or_backfill(&mut conn, "fake", &second, Mode::Delta).await.unwrap();

        assert_eq!(second.seen_since.lock().unwrap().as_deref(), Some("2024-12-31"));
    }
}
