//! `POST /ingest/{source}/delta|backfill|from-csv` (spec §6): the HTTP
//! twin of `ctl ingest`, sharing the same `ingest::run_delta_or_backfill` /
//! `run_csv_import` entry points.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::http::error::ApiResult;
use crate::http::state::AppState;
use crate::ingest::{self, HttpUpstreamClient, Mode};

fn client_for_source(source: &str) -> crate::error::Result<HttpUpstreamClient> {
    let env_key = source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect::<String>();
    let base_url = std::env::var(format!("{env_key}_BASE_URL"))
        .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("{env_key}_BASE_URL is not set"))))?;
    let api_key = std::env::var(format!("{env_key}_API_KEY"))
        .map_err(|_| anyhow::anyhow!(CoreError::Validation(format!("{env_key}_API_KEY is not set"))))?;
    HttpUpstreamClient::new(base_url, &api_key)
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub source: String,
    pub rows_upserted: i64,
}

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    pub months: u32,
}

pub async fn delta(State(state): State<AppState>, Path(source): Path<String>) -> ApiResult<Json<IngestResponse>> {
    let client = client_for_source(&source)?;
    let mut conn = state.conn.lock().await;
    let rows_upserted = ingest::run_delta_or_backfill(&mut conn, &source, &client, Mode::Delta).await?;
    Ok(Json(IngestResponse { source, rows_upserted }))
}

pub async fn backfill(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(req): Json<BackfillRequest>,
) -> ApiResult<Json<IngestResponse>> {
    let client = client_for_source(&source)?;
    let mut conn = state.conn.lock().await;
    let rows_upserted = ingest::run_delta_or_backfill(&mut conn, &source, &client, Mode::Backfill { months: req.months }).await?;
    Ok(Json(IngestResponse { source, rows_upserted }))
}

#[derive(Debug, Deserialize)]
pub struct CsvImportRequest {
    pub path: std::path::PathBuf,
    pub account: String,
    #[serde(default = "default_account_type")]
    pub account_type: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_account_type() -> String {
    "checking".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

pub async fn from_csv(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(req): Json<CsvImportRequest>,
) -> ApiResult<Json<IngestResponse>> {
    let mut conn = state.conn.lock().await;
    let rows_upserted =
        ingest::run_csv_import(&mut conn, &source, &req.path, &req.account, &req.account_type, &req.currency)?;
    Ok(Json(IngestResponse { source, rows_upserted }))
}
