//! Event stream route.

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::http_api::{event_stream, ApiState};

/// `GET /api/events`: one long-lived `text/event-stream` per client.
pub fn events_router() -> Router<Arc<ApiState>> {
    Router::new().route("/api/events", get(event_stream))
}
