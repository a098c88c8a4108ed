use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use tt_api_types::{channels, ConnectionState, ConnectionStatus, NotificationKind};
use tt_core::config_store::ConfigStore;

use crate::event_hub::EventHub;
use crate::notifications::NotificationCenter;
use crate::remote::{RemoteConnectionManager, RemoteConnector, StatusListener};
use crate::shell::ShellState;
use crate::updater::{DisabledUpdater, UpdaterService};

/// Process-scoped services shared by every route handler.
///
/// Built once at startup; handlers receive it as `State<Arc<ApiState>>`.
pub struct ApiState {
    pub hub: EventHub,
    pub remote: Arc<RemoteConnectionManager>,
    pub notifications: Arc<NotificationCenter>,
    pub shell: Arc<ShellState>,
    pub updater: Arc<dyn UpdaterService>,
    pub config: Arc<ConfigStore>,
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    /// Wire the services together:
    /// - every remote status change is published on `ssh:status`
    /// - a failed connect also raises an error notification
    /// - successful connect/disconnect switch the shell mode
    pub fn new(config: Arc<ConfigStore>, connector: Arc<dyn RemoteConnector>) -> Self {
        let cfg = config.get();
        let hub = EventHub::with_keepalive(Duration::from_secs(cfg.server.keepalive_secs.max(1)));
        let notifications = Arc::new(NotificationCenter::new(
            hub.clone(),
            cfg.notifications.max_notifications,
        ));
        let shell = Arc::new(ShellState::new(hub.clone()));

        let remote = RemoteConnectionManager::new(connector, config.clone())
            .with_status_listener(status_listener(hub.clone(), notifications.clone()))
            .with_mode_hook(shell.clone());

        Self {
            updater: Arc::new(DisabledUpdater::new(hub.clone())),
            hub,
            remote: Arc::new(remote),
            notifications,
            shell,
            config,
            started_at: Utc::now(),
        }
    }

    pub fn with_updater(mut self, updater: Arc<dyn UpdaterService>) -> Self {
        self.updater = updater;
        self
    }
}

fn status_listener(hub: EventHub, notifications: Arc<NotificationCenter>) -> StatusListener {
    Arc::new(move |status: &ConnectionStatus| {
        let delivered = hub.publish(channels::SSH_STATUS, status);
        debug!(state = %status.state, delivered, "connection status published");

        if status.state == ConnectionState::Error {
            let host = status.connected_host.as_deref().unwrap_or("remote host");
            let detail = status.error.as_deref().unwrap_or("unknown error");
            notifications.add(
                NotificationKind::Error,
                "SSH connection failed",
                format!("{host}: {detail}"),
            );
        }
    })
}
