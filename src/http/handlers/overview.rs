//! `GET /overview` (spec §6): the compact digest the dashboard renders.

use axum::extract::State;
use axum::Json;

use crate::clock::SystemClock;
use crate::error::CoreError;
use crate::http::error::ApiResult;
use crate::http::state::AppState;
use crate::snapshot_job::{self, Digest};

pub async fn overview(State(state): State<AppState>) -> ApiResult<Json<Digest>> {
    let conn = state.conn.lock().await;
    let digest = snapshot_job::digest(&conn, &SystemClock, state.config.buffer_floor_cents)?
        .ok_or_else(|| anyhow::anyhow!(CoreError::NotFound("no forecast snapshot has run yet".to_string())))?;
    Ok(Json(digest))
}
