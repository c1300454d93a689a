//! `GET /calendar`, `GET /key-events` (spec §6): raw dated entries, not run
//! through the forecast engine — for a UI that wants the calendar rows
//! without the running-balance computation.

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::calendar::{self, Entry, EntryType};
use crate::db::schedule;
use crate::error::CoreError;
use crate::http::error::ApiResult;
use crate::http::state::AppState;

fn parse_date(s: &str) -> crate::error::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("invalid date: {s}"))))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: String,
    pub to: String,
}

pub async fn calendar(State(state): State<AppState>, Query(q): Query<RangeQuery>) -> ApiResult<Json<Vec<Entry>>> {
    let from = parse_date(&q.from)?;
    let to = parse_date(&q.to)?;

    let conn = state.conn.lock().await;
    let commitments = schedule::list_commitments(&conn)?;
    let inflows = schedule::list_scheduled_inflows(&conn)?;
    let key_events = schedule::list_key_spend_events(&conn)?;
    Ok(Json(calendar::expand(&commitments, &inflows, &key_events, from, to)))
}

pub async fn key_events(State(state): State<AppState>, Query(q): Query<RangeQuery>) -> ApiResult<Json<Vec<Entry>>> {
    let from = parse_date(&q.from)?;
    let to = parse_date(&q.to)?;

    let conn = state.conn.lock().await;
    let key_events = schedule::list_key_spend_events(&conn)?;
    let entries: Vec<Entry> = calendar::expand_key_events(&key_events, from, to, from)
        .into_iter()
        .filter(|e| matches!(e.entry_type, EntryType::KeyEvent))
        .collect();
    Ok(Json(entries))
}
