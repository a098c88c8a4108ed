//! In-process call surface.
//!
//! When the UI is embedded in the desktop shell there is no HTTP hop: the
//! host hands it an [`InProcessBridge`] that calls the same services the
//! HTTP routes use. Hub events reach listeners through a forwarding task
//! subscribed to the hub like any other connection.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tt_api_types::{
    AppMode, ConnectionConfig, ConnectionStatus, LastConnection, Mention, MentionValidation,
    NotificationsPage, PathValidation, ResolvedHostEntry, ScrollToLineResponse,
    TestConnectionResult,
};
use tt_client::error::{Result, TransportError};
use tt_client::{CallSurface, Listener, ListenerRegistry, Subscription, TransportKind};

use crate::event_hub::{EventHub, Frame};
use crate::http_api::ApiState;
use crate::notifications::{checked_id, coerce_limit, coerce_offset};
use crate::validation;

pub struct InProcessBridge {
    state: Arc<ApiState>,
    listeners: ListenerRegistry,
    forwarder: JoinHandle<()>,
}

impl InProcessBridge {
    /// Attach to `state`. Must be called inside a tokio runtime.
    pub fn new(state: Arc<ApiState>) -> Self {
        let listeners = ListenerRegistry::new();
        let forwarder = tokio::spawn(forward_events(state.hub.clone(), listeners.clone()));
        Self {
            state,
            listeners,
            forwarder,
        }
    }

    pub fn state(&self) -> &Arc<ApiState> {
        &self.state
    }
}

impl Drop for InProcessBridge {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn forward_events(hub: EventHub, listeners: ListenerRegistry) {
    let conn = hub.subscribe();
    debug!(connection = %conn.id(), "in-process bridge attached to hub");
    while let Some(frame) = conn.recv().await {
        let Frame::Event { channel, data } = frame else {
            continue;
        };
        let payload = serde_json::from_str::<Value>(&data)
            .unwrap_or_else(|_| Value::String(data.to_string()));
        listeners.dispatch(&channel, &payload);
    }
}

fn remote_err(e: impl std::fmt::Display) -> TransportError {
    TransportError::Remote(e.to_string())
}

#[async_trait]
impl CallSurface for InProcessBridge {
    fn kind(&self) -> TransportKind {
        TransportKind::InProcess
    }

    async fn get_notifications(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> NotificationsPage {
        let limit = coerce_limit(limit.map(i64::from));
        let offset = coerce_offset(offset.map(i64::from));
        self.state.notifications.page(limit, offset)
    }

    async fn mark_notification_read(&self, id: &str) -> bool {
        checked_id("mark_read", id).is_some_and(|id| self.state.notifications.mark_read(id))
    }

    async fn mark_all_notifications_read(&self) -> bool {
        self.state.notifications.mark_all_read()
    }

    async fn delete_notification(&self, id: &str) -> bool {
        checked_id("delete", id).is_some_and(|id| self.state.notifications.delete(id))
    }

    async fn clear_notifications(&self) -> bool {
        self.state.notifications.clear_all()
    }

    async fn unread_notification_count(&self) -> usize {
        self.state.notifications.unread_count()
    }

    async fn remote_connect(&self, config: ConnectionConfig) -> Result<ConnectionStatus> {
        self.state.remote.connect(config).await.map_err(remote_err)
    }

    async fn remote_disconnect(&self) -> Result<ConnectionStatus> {
        self.state.remote.disconnect().await.map_err(remote_err)
    }

    async fn remote_status(&self) -> ConnectionStatus {
        self.state.remote.get_status()
    }

    async fn remote_test(&self, config: ConnectionConfig) -> Result<TestConnectionResult> {
        Ok(self.state.remote.test_connection(&config).await)
    }

    async fn remote_config_hosts(&self) -> Vec<String> {
        self.state.remote.get_config_hosts().await
    }

    async fn remote_resolve_host(&self, alias: &str) -> Option<ResolvedHostEntry> {
        self.state.remote.resolve_host_config(alias).await
    }

    async fn save_last_connection(&self, last: LastConnection) -> bool {
        match self.state.remote.save_last_connection(last) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "save_last_connection failed");
                false
            }
        }
    }

    async fn last_connection(&self) -> Option<LastConnection> {
        self.state.remote.load_last_connection()
    }

    async fn validate_path(&self, relative_path: &str, project_path: &str) -> PathValidation {
        validation::validate_path(relative_path, project_path).await
    }

    async fn validate_mentions(
        &self,
        mentions: Vec<Mention>,
        project_path: &str,
    ) -> MentionValidation {
        validation::validate_mentions(&mentions, project_path).await
    }

    async fn scroll_to_line(&self, session_id: &str, line_number: i64) -> ScrollToLineResponse {
        validation::scroll_to_line(session_id, line_number)
    }

    async fn check_for_updates(&self) -> Result<()> {
        self.state.updater.check_for_updates().await.map_err(remote_err)
    }

    async fn download_update(&self) -> Result<()> {
        self.state.updater.download_update().await.map_err(remote_err)
    }

    async fn install_update(&self) -> Result<()> {
        self.state.updater.install_update().await.map_err(remote_err)
    }

    async fn get_zoom_factor(&self) -> f64 {
        self.state.shell.zoom_factor()
    }

    async fn get_mode(&self) -> AppMode {
        self.state.shell.mode()
    }

    fn on(&self, channel: &str, listener: Listener) -> Subscription {
        self.listeners.add(channel, listener)
    }
}
