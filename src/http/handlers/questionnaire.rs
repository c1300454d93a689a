//! `GET /q/{query}`, `GET /q/packs/{pack}`, `POST /q/export` (spec §4.10/§6):
//! the nine primitive queries dispatched by name, pack assembly, and the
//! export pipeline.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::error::CoreError;
use crate::http::error::ApiResult;
use crate::http::state::AppState;
use crate::questionnaire::primitives;
use crate::questionnaire::{export, packs, period};

#[derive(Debug, Deserialize)]
pub struct PrimitiveQuery {
    pub period: Option<String>,
    pub category_id: Option<i64>,
    pub months: Option<u32>,
    pub kind: Option<String>,
    pub top_n: Option<usize>,
}

fn resolved_period(q: &PrimitiveQuery, today: chrono::NaiveDate) -> crate::error::Result<period::Period> {
    let alias = q.period.as_deref().unwrap_or("3m_full");
    period::resolve(alias, today)
}

fn require_category_id(q: &PrimitiveQuery) -> crate::error::Result<i64> {
    q.category_id.ok_or_else(|| anyhow::anyhow!(CoreError::Validation("category_id is required".to_string())))
}

/// Dispatches one of the nine primitive queries named in spec §4.10 by the
/// `{query}` path segment. `active_loans` and `subscription_list` don't fit
/// the shared `QueryResult` shape, so they're serialized directly.
pub async fn query(
    State(state): State<AppState>,
    Path(query_name): Path<String>,
    Query(q): Query<PrimitiveQuery>,
) -> ApiResult<axum::response::Response> {
    use axum::response::IntoResponse;

    let conn = state.conn.lock().await;
    let today = Utc::now().date_naive();

    let response = match query_name.as_str() {
        "monthly_total_by_category" => {
            let category_id = require_category_id(&q)?;
            let period = resolved_period(&q, today)?;
            Json(primitives::monthly_total_by_category(&conn, category_id, period)?).into_response()
        }
        "monthly_average_by_category" => {
            let category_id = require_category_id(&q)?;
            let months = q.months.unwrap_or(3);
            Json(primitives::monthly_average_by_category(&conn, category_id, months, today)?).into_response()
        }
        "active_loans" => Json(primitives::active_loans(&conn)?).into_response(),
        "monthly_commitment_total" => {
            let kind = q.kind.clone().ok_or_else(|| anyhow::anyhow!(CoreError::Validation("kind is required".to_string())))?;
            let period = resolved_period(&q, today)?;
            Json(primitives::monthly_commitment_total(&conn, &kind, period)?).into_response()
        }
        "income_summary" => {
            let period = resolved_period(&q, today)?;
            Json(primitives::income_summary(&conn, period)?).into_response()
        }
        "category_breakdown" => {
            let period = resolved_period(&q, today)?;
            let top_n = q.top_n.unwrap_or(5);
            Json(primitives::category_breakdown(&conn, period, top_n)?).into_response()
        }
        "supporting_transactions" => {
            let category_id = require_category_id(&q)?;
            let period = resolved_period(&q, today)?;
            Json(primitives::supporting_transactions(&conn, category_id, period, 0, 50)?).into_response()
        }
        "subscription_list" => Json(primitives::subscription_list(&conn, today)?).into_response(),
        "household_fixed_costs" => {
            let period = resolved_period(&q, today)?;
            let fixed_ids = packs::fixed_cost_category_ids(&conn)?;
            Json(primitives::household_fixed_costs(&conn, &fixed_ids, period)?).into_response()
        }
        other => return Err(anyhow::anyhow!(CoreError::NotFound(format!("unknown query: {other}"))).into()),
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct PackQuery {
    pub period: Option<String>,
}

pub async fn pack(
    State(state): State<AppState>,
    Path(pack_name): Path<String>,
    Query(q): Query<PackQuery>,
) -> ApiResult<Json<packs::Pack>> {
    let conn = state.conn.lock().await;
    let today = Utc::now().date_naive();
    let period_alias = q.period.as_deref().unwrap_or("3m_full");
    Ok(Json(packs::assemble(&conn, &pack_name, period_alias, today)?))
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub pack: String,
    pub period: String,
    #[serde(default)]
    pub format: ExportFormatWire,
    #[serde(default)]
    pub redact_memos: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormatWire {
    Csv,
    Pdf,
    #[default]
    Both,
}

impl From<ExportFormatWire> for export::ExportFormat {
    fn from(w: ExportFormatWire) -> Self {
        match w {
            ExportFormatWire::Csv => export::ExportFormat::Csv,
            ExportFormatWire::Pdf => export::ExportFormat::Pdf,
            ExportFormatWire::Both => export::ExportFormat::Both,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ExportResponse {
    pub hash: String,
    pub generated_at: chrono::DateTime<Utc>,
    pub csv_url: Option<String>,
    pub pdf_url: Option<String>,
}

pub async fn export_pack(State(state): State<AppState>, Json(req): Json<ExportRequest>) -> ApiResult<Json<ExportResponse>> {
    let conn = state.conn.lock().await;
    let today = Utc::now().date_naive();
    let generated_at = Utc::now();

    let result = export::export(
        &conn,
        &req.pack,
        &req.period,
        req.format.into(),
        req.redact_memos,
        today,
        generated_at,
        &state.config.export_dir,
    )?;

    let to_url = |path: Option<std::path::PathBuf>| {
        path.and_then(|p| p.file_name().map(|f| format!("{}/exports/{}", state.config.base_path, f.to_string_lossy())))
    };

    Ok(Json(ExportResponse {
        hash: result.hash,
        generated_at: result.generated_at,
        csv_url: to_url(result.csv_path),
        pdf_url: to_url(result.pdf_path),
    }))
}
