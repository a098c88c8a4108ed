use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::error;

use tt_api_types::ApiEnvelope;

use super::state::ApiState;
use crate::updater::UpdaterError;

fn envelope(op: &str, result: Result<(), UpdaterError>) -> Json<ApiEnvelope<()>> {
    match result {
        Ok(()) => Json(ApiEnvelope::ok_empty()),
        Err(e) => {
            error!(op, error = %e, "updater action failed");
            Json(ApiEnvelope::err(e.to_string()))
        }
    }
}

/// POST /api/updater/check
pub(crate) async fn check(State(state): State<Arc<ApiState>>) -> Json<ApiEnvelope<()>> {
    envelope("check", state.updater.check_for_updates().await)
}

/// POST /api/updater/download
pub(crate) async fn download(State(state): State<Arc<ApiState>>) -> Json<ApiEnvelope<()>> {
    envelope("download", state.updater.download_update().await)
}

/// POST /api/updater/install
pub(crate) async fn install(State(state): State<Arc<ApiState>>) -> Json<ApiEnvelope<()>> {
    envelope("install", state.updater.install_update().await)
}
