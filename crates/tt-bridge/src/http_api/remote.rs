use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use tracing::{error, warn};

use tt_api_types::{
    ApiEnvelope, ConnectionConfig, ConnectionStatus, LastConnection, ResolveHostRequest,
    ResolvedHostEntry, TestConnectionResult,
};

use super::state::ApiState;
use crate::api_error::ApiError;

/// POST /api/remote/connect -- connect, then switch to ssh mode.
pub(crate) async fn connect(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<ConnectionConfig>, JsonRejection>,
) -> Result<Json<ApiEnvelope<ConnectionStatus>>, ApiError> {
    let Json(config) = body.inspect_err(|rejection| {
        warn!(error = %rejection.body_text(), "connect body rejected");
    })?;
    Ok(match state.remote.connect(config).await {
        Ok(status) => Json(ApiEnvelope::ok(status)),
        Err(e) => Json(ApiEnvelope::err(e.to_string())),
    })
}

/// POST /api/remote/disconnect -- tear down, then switch to local mode.
pub(crate) async fn disconnect(
    State(state): State<Arc<ApiState>>,
) -> Json<ApiEnvelope<ConnectionStatus>> {
    match state.remote.disconnect().await {
        Ok(status) => Json(ApiEnvelope::ok(status)),
        Err(e) => {
            error!(error = %e, "disconnect failed");
            Json(ApiEnvelope::err(e.to_string()))
        }
    }
}

/// GET /api/remote/state
pub(crate) async fn get_state(State(state): State<Arc<ApiState>>) -> Json<ConnectionStatus> {
    Json(state.remote.get_status())
}

/// POST /api/remote/test -- open and close a session without touching the connection status.
pub(crate) async fn test_connection(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<ConnectionConfig>, JsonRejection>,
) -> Result<Json<ApiEnvelope<TestConnectionResult>>, ApiError> {
    let Json(config) = body?;
    Ok(Json(ApiEnvelope::ok(state.remote.test_connection(&config).await)))
}

/// GET /api/remote/config-hosts -- always succeeds, possibly empty.
pub(crate) async fn config_hosts(
    State(state): State<Arc<ApiState>>,
) -> Json<ApiEnvelope<Vec<String>>> {
    Json(ApiEnvelope::ok(state.remote.get_config_hosts().await))
}

/// POST /api/remote/resolve-host -- absent data for unknown aliases.
pub(crate) async fn resolve_host(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<ResolveHostRequest>, JsonRejection>,
) -> Json<ApiEnvelope<ResolvedHostEntry>> {
    let Ok(Json(req)) = body else {
        warn!("resolve-host body rejected");
        return Json(ApiEnvelope::ok_empty());
    };
    match state.remote.resolve_host_config(&req.alias).await {
        Some(entry) => Json(ApiEnvelope::ok(entry)),
        None => Json(ApiEnvelope::ok_empty()),
    }
}

/// POST /api/remote/save-last-connection -- persists the secret-free fields.
pub(crate) async fn save_last_connection(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<LastConnection>, JsonRejection>,
) -> Result<Json<ApiEnvelope<()>>, ApiError> {
    let Json(last) = body?;
    Ok(match state.remote.save_last_connection(last) {
        Ok(()) => Json(ApiEnvelope::ok_empty()),
        Err(e) => Json(ApiEnvelope::err(e.to_string())),
    })
}

/// GET /api/remote/last-connection
pub(crate) async fn last_connection(
    State(state): State<Arc<ApiState>>,
) -> Json<ApiEnvelope<LastConnection>> {
    match state.remote.load_last_connection() {
        Some(last) => Json(ApiEnvelope::ok(last)),
        None => Json(ApiEnvelope::ok_empty()),
    }
}
