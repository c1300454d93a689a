//! Maps `CoreError`/`anyhow::Error` onto HTTP status codes (spec §7).
//! Mirrors the teacher's `impl IntoResponse for AuthError` shape: one match
//! from error kind to `(StatusCode, message)`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::CoreError;

pub struct ApiError(pub anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<CoreError>() {
            Some(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            Some(CoreError::Auth(_)) => StatusCode::UNAUTHORIZED,
            Some(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(CoreError::Conflict(_)) => StatusCode::CONFLICT,
            Some(CoreError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            Some(CoreError::Integrity(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Some(CoreError::Db(_)) | Some(CoreError::Io(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
