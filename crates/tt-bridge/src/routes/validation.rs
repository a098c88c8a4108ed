//! Path validation and deep-link routes.

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::http_api::{scroll_to_line, validate_mentions, validate_path, ApiState};

pub fn validation_router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/validate/path", post(validate_path))
        .route("/api/validate/mentions", post(validate_mentions))
        .route("/api/session/scroll-to-line", post(scroll_to_line))
}
