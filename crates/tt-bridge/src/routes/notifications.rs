//! Notification management API routes.
//!
//! Listing with pagination, unread count, marking read (single or bulk),
//! deletion and clearing. Failures answer `false`, `0` or an empty page.

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::http_api::{
    clear_notifications, delete_notification, list_notifications, mark_all_notifications_read,
    mark_notification_read, unread_count, ApiState,
};

/// Build the notifications sub-router, mounted under `/api/notifications`.
pub fn notifications_router() -> Router<Arc<ApiState>> {
    Router::new()
        .route(
            "/api/notifications",
            get(list_notifications).delete(clear_notifications),
        )
        .route("/api/notifications/unread-count", get(unread_count))
        .route(
            "/api/notifications/read-all",
            post(mark_all_notifications_read),
        )
        .route("/api/notifications/{id}/read", post(mark_notification_read))
        .route("/api/notifications/{id}", delete(delete_notification))
}
