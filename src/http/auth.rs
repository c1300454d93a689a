//! Write-route gating (spec §6/§9): `X-Admin-Token`/`X-CSRF-Token` are
//! required on every mutating route once `ADMIN_TOKEN`/`CSRF_TOKEN` are
//! configured. Read routes never pass through this layer, so an
//! LLM/assistant consumer with only read access can never reach a write
//! handler regardless of headers it sends.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::state::AppState;

pub async fn require_admin_and_csrf(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if let Some(expected) = &state.config.admin_token {
        let provided = req.headers().get("X-Admin-Token").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err((StatusCode::UNAUTHORIZED, "missing or invalid X-Admin-Token"));
        }
    }
    if let Some(expected) = &state.config.csrf_token {
        let provided = req.headers().get("X-CSRF-Token").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err((StatusCode::FORBIDDEN, "missing or invalid X-CSRF-Token"));
        }
    }
    Ok(next.run(req).await.into_response())
}
