use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use tt_api_types::NotificationsPage;

use super::state::ApiState;
use crate::notifications::{checked_id, coerce_limit, coerce_offset, parse_query_number};

/// Raw query values; anything unparseable is coerced, never rejected.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct NotificationQuery {
    limit: Option<String>,
    offset: Option<String>,
}

/// GET /api/notifications -- one page, newest first.
pub(crate) async fn list_notifications(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> Json<NotificationsPage> {
    let params = query.map(|Query(q)| q).unwrap_or_default();
    let limit = coerce_limit(parse_query_number(params.limit.as_deref()));
    let offset = coerce_offset(parse_query_number(params.offset.as_deref()));
    Json(state.notifications.page(limit, offset))
}

/// POST /api/notifications/{id}/read
pub(crate) async fn mark_notification_read(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Json<bool> {
    let Some(id) = checked_id("mark_read", &id) else {
        return Json(false);
    };
    Json(state.notifications.mark_read(id))
}

/// POST /api/notifications/read-all
pub(crate) async fn mark_all_notifications_read(State(state): State<Arc<ApiState>>) -> Json<bool> {
    Json(state.notifications.mark_all_read())
}

/// DELETE /api/notifications/{id}
pub(crate) async fn delete_notification(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Json<bool> {
    let Some(id) = checked_id("delete", &id) else {
        return Json(false);
    };
    Json(state.notifications.delete(id))
}

/// DELETE /api/notifications
pub(crate) async fn clear_notifications(State(state): State<Arc<ApiState>>) -> Json<bool> {
    Json(state.notifications.clear_all())
}

/// GET /api/notifications/unread-count
pub(crate) async fn unread_count(State(state): State<Arc<ApiState>>) -> Json<usize> {
    Json(state.notifications.unread_count())
}
