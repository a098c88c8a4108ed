use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use tt_api_types::{
    channels, AppMode, ConnectionConfig, ConnectionStatus, LastConnection, Mention,
    MentionValidation, Notification, NotificationCounts, NotificationsPage, PathValidation,
    ResolvedHostEntry, ScrollToLineResponse, TestConnectionResult, UpdaterEvent,
};

use crate::error::Result;
use crate::listeners::Subscription;

// ---------------------------------------------------------------------------
// TransportKind: identifies which implementation is behind the surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Host-provided bridge, same process as the backend services.
    InProcess,
    /// HTTP calls plus the server event stream.
    Http,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::InProcess => write!(f, "in-process"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

// ---------------------------------------------------------------------------
// CallSurface: the one API every consumer codes against
// ---------------------------------------------------------------------------

/// The application's call surface, identical under every hosting mode.
///
/// Methods that degrade on failure return plain values (empty, `false`,
/// zero, `None`). Remote connect/test and the updater actions return the
/// backend's error text instead, since the user has to see why they failed.
#[async_trait]
pub trait CallSurface: Send + Sync + 'static {
    fn kind(&self) -> TransportKind;

    // ---- Notifications ----------------------------------------------------
    async fn get_notifications(&self, limit: Option<u32>, offset: Option<u32>)
        -> NotificationsPage;
    async fn mark_notification_read(&self, id: &str) -> bool;
    async fn mark_all_notifications_read(&self) -> bool;
    async fn delete_notification(&self, id: &str) -> bool;
    async fn clear_notifications(&self) -> bool;
    async fn unread_notification_count(&self) -> usize;

    // ---- Remote host ------------------------------------------------------
    async fn remote_connect(&self, config: ConnectionConfig) -> Result<ConnectionStatus>;
    async fn remote_disconnect(&self) -> Result<ConnectionStatus>;
    async fn remote_status(&self) -> ConnectionStatus;
    async fn remote_test(&self, config: ConnectionConfig) -> Result<TestConnectionResult>;
    async fn remote_config_hosts(&self) -> Vec<String>;
    async fn remote_resolve_host(&self, alias: &str) -> Option<ResolvedHostEntry>;
    async fn save_last_connection(&self, last: LastConnection) -> bool;
    async fn last_connection(&self) -> Option<LastConnection>;

    // ---- Validation -------------------------------------------------------
    async fn validate_path(&self, relative_path: &str, project_path: &str) -> PathValidation;
    async fn validate_mentions(
        &self,
        mentions: Vec<Mention>,
        project_path: &str,
    ) -> MentionValidation;
    async fn scroll_to_line(&self, session_id: &str, line_number: i64) -> ScrollToLineResponse;

    // ---- Updater ----------------------------------------------------------
    async fn check_for_updates(&self) -> Result<()>;
    async fn download_update(&self) -> Result<()>;
    async fn install_update(&self) -> Result<()>;

    // ---- Shell state ------------------------------------------------------
    async fn get_zoom_factor(&self) -> f64;
    async fn get_mode(&self) -> AppMode;

    // ---- Push events ------------------------------------------------------
    /// Register a listener for one event channel.
    fn on(&self, channel: &str, listener: crate::listeners::Listener) -> Subscription;
}

/// Typed helpers over [`CallSurface::on`].
pub trait CallSurfaceExt: CallSurface {
    /// Subscribe with payloads decoded into `T`. Payloads that fail to
    /// decode are logged and skipped.
    fn on_typed<T, F>(&self, channel: &str, f: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let name = channel.to_string();
        self.on(
            channel,
            Arc::new(move |payload: &Value| match T::deserialize(payload) {
                Ok(v) => f(v),
                Err(e) => warn!(channel = %name, error = %e, "dropping undecodable event payload"),
            }),
        )
    }

    fn on_zoom_factor_changed<F>(&self, f: F) -> Subscription
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_typed(channels::ZOOM_FACTOR_CHANGED, f)
    }

    fn on_connection_status<F>(&self, f: F) -> Subscription
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.on_typed(channels::SSH_STATUS, f)
    }

    fn on_update_status<F>(&self, f: F) -> Subscription
    where
        F: Fn(UpdaterEvent) + Send + Sync + 'static,
    {
        self.on_typed(channels::UPDATER_STATUS, f)
    }

    fn on_new_notification<F>(&self, f: F) -> Subscription
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.on_typed(channels::NOTIFICATION_NEW, f)
    }

    fn on_notification_counts<F>(&self, f: F) -> Subscription
    where
        F: Fn(NotificationCounts) + Send + Sync + 'static,
    {
        self.on_typed(channels::NOTIFICATION_UPDATED, f)
    }

    fn on_mode_changed<F>(&self, f: F) -> Subscription
    where
        F: Fn(AppMode) + Send + Sync + 'static,
    {
        self.on_typed(channels::MODE_CHANGED, f)
    }
}

impl<S: CallSurface + ?Sized> CallSurfaceExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_display_and_serialize() {
        assert_eq!(TransportKind::InProcess.to_string(), "in-process");
        assert_eq!(TransportKind::Http.to_string(), "http");

        let json = serde_json::to_string(&TransportKind::InProcess).unwrap();
        assert_eq!(json, "\"in_process\"");
    }
}
