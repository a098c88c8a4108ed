//! HTTP API error type.
//!
//! Most routes answer failures with a safe default or a `success:false`
//! envelope. `ApiError` covers what is left: unknown routes and remote
//! connection bodies that cannot be parsed into anything usable.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use tt_api_types::ApiEnvelope;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body: ApiEnvelope<()> = ApiEnvelope::err(self.to_string());
        (status, Json(body)).into_response()
    }
}

/// Fallback for anything under `/api` that no route claims.
pub async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
