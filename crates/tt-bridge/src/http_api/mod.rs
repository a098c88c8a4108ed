// ---------------------------------------------------------------------------
// HTTP API module directory
// ---------------------------------------------------------------------------
//
// Handlers are grouped by domain. This file owns the top-level router and
// re-exports the handlers the per-domain sub-routers in `crate::routes`
// mount.

mod events;
mod misc;
mod notifications;
mod remote;
pub mod state;
mod updater;
mod validation;

pub use state::ApiState;

pub(crate) use events::event_stream;
pub(crate) use misc::{health, mode, zoom_factor};
pub(crate) use notifications::{
    clear_notifications, delete_notification, list_notifications, mark_all_notifications_read,
    mark_notification_read, unread_count,
};
pub(crate) use remote::{
    config_hosts, connect, disconnect, get_state, last_connection, resolve_host,
    save_last_connection, test_connection,
};
pub(crate) use updater::{check as updater_check, download as updater_download, install as updater_install};
pub(crate) use validation::{scroll_to_line, validate_path, validate_mentions};

// ---------------------------------------------------------------------------
// Router + middleware
// ---------------------------------------------------------------------------

use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::{api_error, routes};
use tt_telemetry::tracing_setup::request_id_middleware;

/// Build the full API router: event stream, call-surface endpoints and the
/// `/api` not-found fallback.
pub fn api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(routes::events::events_router())
        .merge(routes::notifications::notifications_router())
        .merge(routes::remote::remote_router())
        .merge(routes::validation::validation_router())
        .merge(routes::updater::updater_router())
        .merge(routes::misc::misc_router())
        .fallback(api_error::not_found)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
