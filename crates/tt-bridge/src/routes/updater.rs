//! Updater action routes. Progress arrives on `updater:status`.

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::http_api::{updater_check, updater_download, updater_install, ApiState};

pub fn updater_router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/updater/check", post(updater_check))
        .route("/api/updater/download", post(updater_download))
        .route("/api/updater/install", post(updater_install))
}
