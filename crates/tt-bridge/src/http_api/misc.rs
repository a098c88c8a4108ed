use axum::{extract::State, Json};
use std::sync::Arc;

use tt_api_types::{AppMode, HealthResponse};

use super::state::ApiState;

/// GET /api/health
pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: state.hub.connection_count(),
    })
}

/// GET /api/zoom-factor
pub(crate) async fn zoom_factor(State(state): State<Arc<ApiState>>) -> Json<f64> {
    Json(state.shell.zoom_factor())
}

/// GET /api/mode
pub(crate) async fn mode(State(state): State<Arc<ApiState>>) -> Json<AppMode> {
    Json(state.shell.mode())
}
