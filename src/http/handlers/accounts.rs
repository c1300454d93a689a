//! `GET /accounts`, `GET /accounts/anchors`, `GET /accounts/floors`, `PUT
//! /accounts/{id}/anchor` (spec §6).

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{accounts, anchors};
use crate::error::CoreError;
use crate::http::error::ApiResult;
use crate::http::state::AppState;
use crate::models::{Account, AccountAnchor};

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Account>>> {
    let conn = state.conn.lock().await;
    Ok(Json(accounts::list_all(&conn)?))
}

pub async fn anchors_list(State(state): State<AppState>) -> ApiResult<Json<Vec<AccountAnchor>>> {
    let conn = state.conn.lock().await;
    Ok(Json(anchors::list_all(&conn)?))
}

#[derive(Debug, Serialize)]
pub struct AccountFloor {
    pub account_id: i64,
    pub min_floor_cents: Option<i64>,
}

pub async fn floors(State(state): State<AppState>) -> ApiResult<Json<Vec<AccountFloor>>> {
    let conn = state.conn.lock().await;
    let floors = anchors::list_all(&conn)?
        .into_iter()
        .map(|a| AccountFloor { account_id: a.account_id, min_floor_cents: a.min_floor_cents })
        .collect();
    Ok(Json(floors))
}

#[derive(Debug, Deserialize)]
pub struct UpsertAnchorRequest {
    pub anchor_date: NaiveDate,
    pub anchor_balance_cents: i64,
    pub min_floor_cents: Option<i64>,
}

pub async fn upsert_anchor(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(req): Json<UpsertAnchorRequest>,
) -> ApiResult<Json<AccountAnchor>> {
    let conn = state.conn.lock().await;
    if accounts::get(&conn, account_id)?.is_none() {
        return Err(anyhow::anyhow!(CoreError::NotFound(format!("account {account_id}"))).into());
    }

    let anchor = AccountAnchor {
        account_id,
        anchor_date: req.anchor_date,
        anchor_balance_cents: req.anchor_balance_cents,
        min_floor_cents: req.min_floor_cents,
    };
    anchors::upsert(&conn, &anchor)?;
    Ok(Json(anchor))
}
