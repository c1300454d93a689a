//! `POST /key-events`, `DELETE /key-events/{id}` (spec §6).

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::schedule;
use crate::error::CoreError;
use crate::http::error::ApiResult;
use crate::http::state::AppState;
use crate::models::KeySpendEvent;

#[derive(Debug, Deserialize)]
pub struct UpsertKeyEventRequest {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub event_date: NaiveDate,
    pub repeat_rule: Option<String>,
    pub planned_amount_cents: i64,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub lead_time_days: i64,
    #[serde(default = "default_shift_policy")]
    pub shift_policy: String,
    pub account_id: Option<i64>,
}

fn default_shift_policy() -> String {
    "AS_SCHEDULED".to_string()
}

pub async fn upsert(State(state): State<AppState>, Json(req): Json<UpsertKeyEventRequest>) -> ApiResult<Json<KeySpendEvent>> {
    let event = KeySpendEvent {
        id: req.id,
        name: req.name,
        event_date: req.event_date,
        repeat_rule: req.repeat_rule,
        planned_amount_cents: req.planned_amount_cents,
        category_id: req.category_id,
        lead_time_days: req.lead_time_days,
        shift_policy: req.shift_policy,
        account_id: req.account_id,
    };

    let conn = state.conn.lock().await;
    let id = schedule::upsert_key_spend_event(&conn, &event)?;
    Ok(Json(KeySpendEvent { id, ..event }))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<axum::http::StatusCode> {
    let conn = state.conn.lock().await;
    let deleted = schedule::delete_key_spend_event(&conn, id)?;
    if !deleted {
        return Err(anyhow::anyhow!(CoreError::NotFound(format!("key spend event {id}"))).into());
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}
