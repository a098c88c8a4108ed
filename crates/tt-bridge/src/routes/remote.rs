//! Remote host connection routes.
//!
//! Connect and disconnect drive the connection state machine and switch the
//! application mode. Test, alias discovery and alias resolution never touch
//! the connection status.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::http_api::{
    config_hosts, connect, disconnect, get_state, last_connection, resolve_host,
    save_last_connection, test_connection, ApiState,
};

pub fn remote_router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/api/remote/connect", post(connect))
        .route("/api/remote/disconnect", post(disconnect))
        .route("/api/remote/state", get(get_state))
        .route("/api/remote/test", post(test_connection))
        .route("/api/remote/config-hosts", get(config_hosts))
        .route("/api/remote/resolve-host", post(resolve_host))
        .route(
            "/api/remote/save-last-connection",
            post(save_last_connection),
        )
        .route("/api/remote/last-connection", get(last_connection))
}
