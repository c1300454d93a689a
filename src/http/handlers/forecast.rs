//! `GET /forecast/calendar`, `GET /forecast/blended`, `POST
//! /forecast/simulate-spend` (spec §6/§4.5-§4.7).

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::anchor;
use crate::calendar;
use crate::db::{accounts, schedule};
use crate::error::CoreError;
use crate::forecast::{self, DailyStats};
use crate::http::error::ApiResult;
use crate::http::state::AppState;
use crate::variable_spend;

fn parse_date(s: &str) -> crate::error::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("invalid date: {s}"))))
}

fn account_ids_for(conn: &rusqlite::Connection, accounts_filter: Option<&str>) -> crate::error::Result<Vec<i64>> {
    let active = accounts::list_active(conn)?;
    match accounts_filter {
        None => Ok(active.iter().map(|a| a.id).collect()),
        Some(names) => {
            let wanted: Vec<&str> = names.split(',').map(|n| n.trim()).filter(|n| !n.is_empty()).collect();
            Ok(active.iter().filter(|a| wanted.contains(&a.name.as_str())).map(|a| a.id).collect())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub start: String,
    pub end: String,
    pub buffer_floor: Option<i64>,
    pub accounts: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalendarMeta {
    pub empty_series: bool,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub opening_balance_cents: i64,
    pub entries: Vec<calendar::Entry>,
    pub balances: std::collections::BTreeMap<NaiveDate, i64>,
    pub min_balance_cents: i64,
    pub min_balance_date: NaiveDate,
    pub meta: CalendarMeta,
}

/// Shared by `/forecast/calendar` and `/forecast/blended`: opens the
/// accounts/commitments/inflows/key-events for `[start, end]` and returns
/// the opening balance plus expanded entries, the same shape
/// `snapshot_job::run` builds for "today" but parameterized on an explicit
/// window instead of the wall clock.
fn load_series(
    conn: &rusqlite::Connection,
    start: NaiveDate,
    end: NaiveDate,
    buffer_floor_cents: i64,
    accounts_filter: Option<&str>,
) -> crate::error::Result<(i64, Vec<calendar::Entry>, forecast::ForecastSeries)> {
    let account_ids = account_ids_for(conn, accounts_filter)?;
    let opening = anchor::opening_balance(conn, &account_ids, start - Duration::days(1))?;

    let commitments = schedule::list_commitments(conn)?;
    let inflows = schedule::list_scheduled_inflows(conn)?;
    let key_events = schedule::list_key_spend_events(conn)?;
    let entries = calendar::expand(&commitments, &inflows, &key_events, start, end);

    let series = forecast::compute_balances(opening, &entries, start, end, buffer_floor_cents);
    Ok((opening, entries, series))
}

pub async fn calendar(State(state): State<AppState>, Query(q): Query<CalendarQuery>) -> ApiResult<Json<CalendarResponse>> {
    let start = parse_date(&q.start)?;
    let end = parse_date(&q.end)?;
    let buffer_floor_cents = q.buffer_floor.unwrap_or(state.config.buffer_floor_cents);

    let conn = state.conn.lock().await;
    let (opening, entries, series) = load_series(&conn, start, end, buffer_floor_cents, q.accounts.as_deref())?;

    Ok(Json(CalendarResponse {
        opening_balance_cents: opening,
        meta: CalendarMeta { empty_series: entries.is_empty() },
        entries,
        balances: series.balances,
        min_balance_cents: series.min_balance_cents,
        min_balance_date: series.min_balance_date,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BlendedQuery {
    pub start: String,
    pub end: String,
    pub buffer_floor: Option<i64>,
    pub accounts: Option<String>,
    pub mu_daily: Option<f64>,
    pub sigma_daily: Option<f64>,
    pub band_k: Option<f64>,
}

/// Lookback window for deriving `mu`/`sigma`/weekday multipliers from
/// history when the caller doesn't supply them explicitly (spec §4.7 names
/// 180 days as the reference window for `compute_daily_stats`).
const BLENDED_HISTORY_DAYS: i64 = 180;

#[derive(Debug, Serialize)]
pub struct BlendedResponse {
    #[serde(flatten)]
    pub calendar: CalendarResponse,
    pub baseline_blended: std::collections::BTreeMap<NaiveDate, f64>,
    pub bands: BlendedBands,
}

#[derive(Debug, Serialize)]
pub struct BlendedBands {
    pub lower: std::collections::BTreeMap<NaiveDate, f64>,
    pub upper: std::collections::BTreeMap<NaiveDate, f64>,
}

pub async fn blended(State(state): State<AppState>, Query(q): Query<BlendedQuery>) -> ApiResult<Json<BlendedResponse>> {
    let start = parse_date(&q.start)?;
    let end = parse_date(&q.end)?;
    let buffer_floor_cents = q.buffer_floor.unwrap_or(state.config.buffer_floor_cents);

    let conn = state.conn.lock().await;
    let (opening, entries, series) = load_series(&conn, start, end, buffer_floor_cents, q.accounts.as_deref())?;

    let (stats, weekday_multipliers) = match (q.mu_daily, q.sigma_daily) {
        (Some(mu_cents), Some(sigma_cents)) => (DailyStats { mu_cents, sigma_cents }, [1.0; 7]),
        _ => {
            let history_start = start - Duration::days(BLENDED_HISTORY_DAYS);
            let tolerance = state.config.tunables.commitment_drift_amount_tolerance_cents;
            let daily =
                variable_spend::historical_daily_outflows(&conn, history_start, start - Duration::days(1), tolerance)?;
            (forecast::compute_daily_stats(&daily), forecast::compute_weekday_multipliers(&daily))
        }
    };
    let band_k = q.band_k.unwrap_or(state.config.tunables.blended_band_k);

    let blended_series = forecast::compute_blended(&series.balances, stats, weekday_multipliers, band_k);

    Ok(Json(BlendedResponse {
        calendar: CalendarResponse {
            opening_balance_cents: opening,
            meta: CalendarMeta { empty_series: entries.is_empty() },
            entries,
            balances: series.balances,
            min_balance_cents: series.min_balance_cents,
            min_balance_date: series.min_balance_date,
        },
        baseline_blended: blended_series.baseline_blended,
        bands: BlendedBands { lower: blended_series.band_lower, upper: blended_series.band_upper },
    }))
}

/// Days of horizon `POST /forecast/simulate-spend` forecasts over when the
/// caller doesn't supply `horizon_days` (spec §4.8 names 120 as the
/// standard snapshot horizon; the simulator reuses it as its default).
const DEFAULT_SIMULATE_HORIZON_DAYS: i64 = crate::snapshot_job::HORIZON_DAYS;

#[derive(Debug, Deserialize)]
pub struct SimulateSpendRequest {
    pub date: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub mode: Option<String>,
    pub buffer_floor: Option<i64>,
    pub horizon_days: Option<i64>,
}

pub async fn simulate_spend(
    State(state): State<AppState>,
    Json(req): Json<SimulateSpendRequest>,
) -> ApiResult<Json<forecast::SimulationResult>> {
    let date = parse_date(&req.date)?;
    let buffer_floor_cents = req.buffer_floor.unwrap_or(state.config.buffer_floor_cents);
    let horizon_days = req.horizon_days.unwrap_or(DEFAULT_SIMULATE_HORIZON_DAYS);
    let end = date + Duration::days(horizon_days);

    let conn = state.conn.lock().await;
    let account_ids: Vec<i64> = accounts::list_active(&conn)?.iter().map(|a| a.id).collect();
    let opening = anchor::opening_balance(&conn, &account_ids, date - Duration::days(1))?;

    let commitments = schedule::list_commitments(&conn)?;
    let inflows = schedule::list_scheduled_inflows(&conn)?;
    let key_events = schedule::list_key_spend_events(&conn)?;
    let entries = calendar::expand(&commitments, &inflows, &key_events, date, end);

    let result = forecast::simulate_spend(opening, &entries, date, req.amount_cents, date, end, buffer_floor_cents);
    Ok(Json(result))
}
