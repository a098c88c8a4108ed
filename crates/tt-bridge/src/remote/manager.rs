use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use tt_api_types::{
    AppMode, AuthMethod, ConnectionConfig, ConnectionState, ConnectionStatus, LastConnection,
    ResolvedHostEntry, TestConnectionResult,
};
use tt_core::config_store::ConfigStore;

use super::host_config::SshConfig;
use super::{ModeSwitchHook, RemoteConnector, RemoteError, RemoteSession};

/// Observer for every status change.
pub type StatusListener = Arc<dyn Fn(&ConnectionStatus) + Send + Sync>;

struct Inner {
    status: ConnectionStatus,
    session: Option<Box<dyn RemoteSession>>,
    /// Bumped by every connect attempt and every disconnect, so a connect
    /// that settles late can tell it was overtaken.
    generation: u64,
}

/// State machine around the single remote session of this process.
///
/// States are `disconnected`, `connecting`, `connected` and `error`. Every
/// operation leaves the machine in one of them. A connect while another is
/// in flight or established is rejected; a disconnect is accepted in any
/// state and always ends in `disconnected`, including when it races an
/// in-flight connect.
pub struct RemoteConnectionManager {
    inner: Mutex<Inner>,
    connector: Arc<dyn RemoteConnector>,
    config: Arc<ConfigStore>,
    on_status: Option<StatusListener>,
    mode_hook: Option<Arc<dyn ModeSwitchHook>>,
}

impl RemoteConnectionManager {
    pub fn new(connector: Arc<dyn RemoteConnector>, config: Arc<ConfigStore>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: ConnectionStatus::disconnected(),
                session: None,
                generation: 0,
            }),
            connector,
            config,
            on_status: None,
            mode_hook: None,
        }
    }

    pub fn with_status_listener(mut self, listener: StatusListener) -> Self {
        self.on_status = Some(listener);
        self
    }

    pub fn with_mode_hook(mut self, hook: Arc<dyn ModeSwitchHook>) -> Self {
        self.mode_hook = Some(hook);
        self
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.get().remote.connect_timeout_secs.max(1))
    }

    fn emit(&self, status: &ConnectionStatus) {
        if let Some(listener) = &self.on_status {
            listener(status);
        }
    }

    /// Pure read of the current status.
    pub fn get_status(&self) -> ConnectionStatus {
        self.inner.lock().status.clone()
    }

    /// Connect to `config.host`. Valid from `disconnected` or `error`.
    ///
    /// On failure the status becomes `error` with the message and the same
    /// error is returned. On success the mode hook runs with
    /// [`AppMode::Ssh`] before this returns.
    pub async fn connect(&self, config: ConnectionConfig) -> Result<ConnectionStatus, RemoteError> {
        let host = config.host.trim().to_string();
        let (generation, connecting) = {
            let mut inner = self.inner.lock();
            match inner.status.state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    warn!(host = %host, state = %inner.status.state, "connect rejected");
                    return Err(RemoteError::AlreadyActive(inner.status.state));
                }
                ConnectionState::Disconnected | ConnectionState::Error => {}
            }
            inner.generation += 1;
            inner.status = ConnectionStatus::connecting(host.clone());
            (inner.generation, inner.status.clone())
        };
        self.emit(&connecting);
        info!(host = %host, port = config.port, auth = %config.auth_method, "connecting");

        let pending = PendingConnect {
            manager: self,
            generation,
            host: host.clone(),
            settled: false,
        };
        let result = match validate_config(&config) {
            Ok(()) => self.open_with_timeout(&config).await,
            Err(e) => Err(e),
        };
        pending.settle();

        let status = match result {
            Ok(session) => {
                let settled = {
                    let mut inner = self.inner.lock();
                    if inner.generation == generation {
                        inner.session = Some(session);
                        inner.status = ConnectionStatus::connected(host.clone());
                        Ok(inner.status.clone())
                    } else {
                        Err(session)
                    }
                };
                match settled {
                    Ok(status) => status,
                    Err(stale) => {
                        warn!(host = %host, "connect overtaken by disconnect, closing session");
                        if let Err(e) = stale.close().await {
                            warn!(host = %host, error = %e, "closing abandoned session failed");
                        }
                        return Err(RemoteError::Abandoned(host));
                    }
                }
            }
            Err(e) => {
                let message = non_empty_message(&e);
                error!(host = %host, error = %message, "connect failed");
                let failed = {
                    let mut inner = self.inner.lock();
                    if inner.generation == generation {
                        inner.status = ConnectionStatus::failed(host.clone(), message);
                        Some(inner.status.clone())
                    } else {
                        None
                    }
                };
                if let Some(status) = failed {
                    self.emit(&status);
                }
                return Err(e);
            }
        };

        self.emit(&status);
        info!(host = %host, "connected");
        self.switch_mode(AppMode::Ssh).await?;
        Ok(status)
    }

    /// Tear down the session, if any. Always ends `disconnected`; teardown
    /// errors are logged, not returned. The mode hook runs with
    /// [`AppMode::Local`] before this returns.
    pub async fn disconnect(&self) -> Result<ConnectionStatus, RemoteError> {
        let (session, previous) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            let previous = inner.status.state;
            inner.status = ConnectionStatus::disconnected();
            (inner.session.take(), previous)
        };
        let status = ConnectionStatus::disconnected();
        if previous != ConnectionState::Disconnected {
            self.emit(&status);
        }

        if let Some(session) = session {
            let host = session.host().to_string();
            match session.close().await {
                Ok(()) => info!(host = %host, "disconnected"),
                Err(e) => warn!(host = %host, error = %e, "session teardown failed"),
            }
        }

        self.switch_mode(AppMode::Local).await?;
        Ok(status)
    }

    /// Open and immediately close a session. Never touches the status,
    /// whatever the outcome.
    pub async fn test_connection(&self, config: &ConnectionConfig) -> TestConnectionResult {
        let started = Instant::now();
        let outcome = match validate_config(config) {
            Ok(()) => self.open_with_timeout(config).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(session) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                if let Err(e) = session.close().await {
                    warn!(host = %config.host, error = %e, "closing test session failed");
                }
                info!(host = %config.host, latency_ms, "test connection succeeded");
                TestConnectionResult {
                    success: true,
                    error: None,
                    latency_ms: Some(latency_ms),
                }
            }
            Err(e) => {
                let message = non_empty_message(&e);
                warn!(host = %config.host, error = %message, "test connection failed");
                TestConnectionResult {
                    success: false,
                    error: Some(message),
                    latency_ms: None,
                }
            }
        }
    }

    /// Concrete host aliases from the SSH client config. Empty when the
    /// file is missing or unreadable.
    pub async fn get_config_hosts(&self) -> Vec<String> {
        self.ssh_config().await.aliases()
    }

    pub async fn resolve_host_config(&self, alias: &str) -> Option<ResolvedHostEntry> {
        self.ssh_config().await.resolve(alias)
    }

    async fn ssh_config(&self) -> SshConfig {
        let path = self.config.get().remote.resolved_ssh_config_path();
        SshConfig::load(&path).await
    }

    /// Persist the secret-free projection of a connection.
    pub fn save_last_connection(&self, last: LastConnection) -> Result<(), RemoteError> {
        self.config
            .update(|cfg| cfg.remote.last_connection = Some(last))
            .map(|_| ())
            .map_err(|e| {
                error!(error = %e, "failed to save last connection");
                RemoteError::Persist(e.to_string())
            })
    }

    pub fn load_last_connection(&self) -> Option<LastConnection> {
        self.config.get().remote.last_connection
    }

    async fn open_with_timeout(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let timeout = self.connect_timeout();
        match tokio::time::timeout(timeout, self.connector.open(config)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout {
                host: config.host.clone(),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn switch_mode(&self, mode: AppMode) -> Result<(), RemoteError> {
        let Some(hook) = &self.mode_hook else {
            return Ok(());
        };
        hook.switch_mode(mode).await.map_err(|e| {
            error!(%mode, error = %e, "mode switch failed");
            match e {
                RemoteError::ModeSwitch(_) => e,
                other => RemoteError::ModeSwitch(other.to_string()),
            }
        })
    }
}

/// Guard over an in-flight connect. If the connect future is dropped before
/// the attempt settles (a cancelled HTTP request, say), the status moves to
/// `error` so later connects are not rejected as already connecting.
struct PendingConnect<'a> {
    manager: &'a RemoteConnectionManager,
    generation: u64,
    host: String,
    settled: bool,
}

impl PendingConnect<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let cancelled = {
            let mut inner = self.manager.inner.lock();
            if inner.generation == self.generation
                && inner.status.state == ConnectionState::Connecting
            {
                inner.status = ConnectionStatus::failed(self.host.clone(), "connect was cancelled");
                Some(inner.status.clone())
            } else {
                None
            }
        };
        if let Some(status) = cancelled {
            warn!(host = %self.host, "connect cancelled before it settled");
            self.manager.emit(&status);
        }
    }
}

fn validate_config(config: &ConnectionConfig) -> Result<(), RemoteError> {
    if config.host.trim().is_empty() {
        return Err(RemoteError::InvalidConfig("host is required".into()));
    }
    if config.port == 0 {
        return Err(RemoteError::InvalidConfig("port must be between 1 and 65535".into()));
    }
    match config.auth_method {
        AuthMethod::Key
            if config
                .private_key_path
                .as_deref()
                .is_none_or(|p| p.trim().is_empty()) =>
        {
            Err(RemoteError::InvalidConfig(
                "private key path is required for key authentication".into(),
            ))
        }
        AuthMethod::Password if config.password.as_deref().is_none_or(str::is_empty) => Err(
            RemoteError::InvalidConfig("password is required for password authentication".into()),
        ),
        _ => Ok(()),
    }
}

fn non_empty_message(e: &RemoteError) -> String {
    let message = e.to_string();
    if message.trim().is_empty() {
        "connection failed".to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(auth: AuthMethod) -> ConnectionConfig {
        ConnectionConfig {
            host: "box".into(),
            port: 22,
            username: "u".into(),
            auth_method: auth,
            private_key_path: None,
            password: None,
        }
    }

    #[test]
    fn config_validation() {
        assert!(validate_config(&cfg(AuthMethod::Agent)).is_ok());
        assert!(matches!(
            validate_config(&cfg(AuthMethod::Key)),
            Err(RemoteError::InvalidConfig(_))
        ));
        assert!(matches!(
            validate_config(&cfg(AuthMethod::Password)),
            Err(RemoteError::InvalidConfig(_))
        ));

        let mut with_key = cfg(AuthMethod::Key);
        with_key.private_key_path = Some("/k".into());
        assert!(validate_config(&with_key).is_ok());

        let mut no_host = cfg(AuthMethod::Agent);
        no_host.host = "  ".into();
        assert!(validate_config(&no_host).is_err());
    }

    #[test]
    fn empty_error_text_gets_a_message() {
        assert_eq!(
            non_empty_message(&RemoteError::Connect(String::new())),
            "connection failed"
        );
        assert_eq!(
            non_empty_message(&RemoteError::Connect("Permission denied".into())),
            "Permission denied"
        );
    }
}
