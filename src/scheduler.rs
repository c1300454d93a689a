//! Internal time-based scheduler (spec §5): a single `tokio::spawn`ed loop
//! that wakes once a day at `SCHEDULER_HOUR:SCHEDULER_MINUTE` in
//! `SCHEDULER_TZ` and runs the same ingest+snapshot+alerts job the CLI's
//! `ctl ingest` path uses. Only the instance with `scheduler_enabled = true`
//! (the static "leader" flag, spec §5) runs this loop; a replica fleet
//! leaves it disabled everywhere but one instance.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::db::{accounts, anchors};
use crate::error::Result;
use crate::ingest::{self, Mode, UpstreamClient};

/// One configured upstream source the nightly job should delta-ingest.
pub struct ScheduledSource {
    pub name: String,
    pub client: Arc<dyn UpstreamClient>,
}

/// Runs ingest (delta, for every configured source), the snapshot/digest
/// job, and alert evaluation, in that order, against one open connection.
/// This is the single code path for "run an ingest and snapshot" — invoked
/// either by the scheduler loop below or directly by `ctl`.
pub async fn run_nightly_job(
    conn: &mut Connection,
    clock: &dyn Clock,
    config: &Config,
    sources: &[ScheduledSource],
) -> Result<()> {
    for source in sources {
        if let Err(e) = ingest::run_delta_or_backfill(conn, &source.name, source.client.as_ref(), Mode::Delta).await {
            error!(source = %source.name, error = %e, "nightly ingest failed, continuing with remaining sources");
        }
    }

    crate::snapshot_job::run(conn, clock, config.buffer_floor_cents)?;

    let anchors = anchors::list_all(conn)?;
    let accounts_by_id: HashMap<i64, crate::models::Account> =
        accounts::list_all(conn)?.into_iter().map(|a| (a.id, a)).collect();
    let created = crate::alerts::evaluate(conn, &anchors, &config.overdraft_alert_thresholds, &accounts_by_id, &config.tunables)?;

    info!(alerts_created = created, "nightly job complete");
    Ok(())
}

/// Computes the `DateTime<Utc>` of the next `hour:minute` local instant in
/// `tz` that is strictly after `now`.
fn next_run_at(now: chrono::DateTime<Utc>, tz: Tz, hour: u32, minute: u32) -> chrono::DateTime<Utc> {
    let local_now = now.with_timezone(&tz);
    let today_at_time = tz
        .with_ymd_and_hms(local_now.year(), local_now.month(), local_now.day(), hour, minute, 0)
        .single()
        .expect("valid local wall-clock time");

    let candidate = if today_at_time > local_now {
        today_at_time
    } else {
        today_at_time + chrono::Duration::days(1)
    };
    candidate.with_timezone(&Utc)
}

/// Spawns the scheduler loop as a background task. Returns the `JoinHandle`
/// so callers can hold it (and, in tests, abort it) rather than it running
/// forever detached.
pub fn spawn(
    config: Config,
    sources: Vec<ScheduledSource>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let tz: Tz = config.scheduler_tz.parse().unwrap_or_else(|_| {
            warn!(tz = %config.scheduler_tz, "unrecognized SCHEDULER_TZ, falling back to UTC");
            chrono_tz::UTC
        });
        let clock = crate::clock::SystemClock;

        loop {
            let now = Utc::now();
            let target = next_run_at(now, tz, config.scheduler_hour, config.scheduler_minute);
            let sleep_for = (target - now).to_std().unwrap_or(std::time::Duration::from_secs(60));
            info!(next_run = %target, "scheduler sleeping until next nightly run");
            tokio::time::sleep(sleep_for).await;

            match crate::db::open_db(&config.db_path) {
                Ok(mut conn) => {
                    if let Err(e) = run_nightly_job(&mut conn, &clock, &config, &sources).await {
                        error!(error = %e, "nightly job failed");
                    }
                }
                Err(e) => error!(error = %e, "scheduler could not open database"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap().and_utc()
    }

    #[test]
    fn next_run_is_later_today_when_the_target_time_has_not_passed_yet() {
        let now = utc(2025, 6, 1, 1, 0);
        let next = next_run_at(now, chrono_tz::UTC, 3, 0);
        assert_eq!(next, utc(2025, 6, 1, 3, 0));
    }

    #[test]
    fn next_run_rolls_to_tomorrow_when_the_target_time_already_passed() {
        let now = utc(2025, 6, 1, 5, 0);
        let next = next_run_at(now, chrono_tz::UTC, 3, 0);
        assert_eq!(next, utc(2025, 6, 2, 3, 0));
    }

    #[tokio::test]
    async fn nightly_job_runs_snapshot_and_alerts_even_with_no_configured_sources() {
        let mut conn = crate::db::open_memory_for_tests();
        let clock = crate::clock::FixedClock::at_date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        let config = Config {
            db_path: std::path::PathBuf::from(":memory:"),
            export_dir: std::path::PathBuf::from("/tmp"),
            base_path: String::new(),
            port: 8080,
            admin_token: None,
            csrf_token: None,
            buffer_floor_cents: 0,
            overdraft_alert_thresholds: HashMap::new(),
            scheduler_enabled: true,
            scheduler_hour: 3,
            scheduler_minute: 0,
            scheduler_tz: "UTC".to_string(),
            tunables: crate::config::Tunables::default(),
            ingest_sources: vec![],
        };

        run_nightly_job(&mut conn, &clock, &config, &[]).await.unwrap();

        let digest = crate::snapshot_job::digest(&conn, &clock, 0).unwrap();
        assert!(digest.is_some());
    }
}
