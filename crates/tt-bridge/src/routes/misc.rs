use axum::{routing::get, Router};
use std::sync::Arc;

use crate::http_api::{health, mode, zoom_factor, ApiState};

/// Health, zoom factor and mode.
pub fn misc_router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/zoom-factor", get(zoom_factor))
        .route("/api/mode", get(mode))
}
