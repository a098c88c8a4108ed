use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use tt_bridge::http_api::{api_router, ApiState};
use tt_bridge::remote::{OpenSshConnector, RemoteConnector};
use tt_core::config_store::ConfigStore;

use crate::shutdown::ShutdownSignal;

/// The tether backend process.
///
/// Builds the shared [`ApiState`] once, serves it over HTTP and, on
/// shutdown, closes any open remote session before returning.
pub struct Daemon {
    config: Arc<ConfigStore>,
    state: Arc<ApiState>,
    shutdown: ShutdownSignal,
    port_override: Option<u16>,
}

impl Daemon {
    /// Daemon using the system `ssh` client named in the config.
    pub fn new(config: Arc<ConfigStore>) -> Self {
        let ssh_binary = config.get().remote.ssh_binary;
        Self::with_connector(config, Arc::new(OpenSshConnector::new(ssh_binary)))
    }

    pub fn with_connector(config: Arc<ConfigStore>, connector: Arc<dyn RemoteConnector>) -> Self {
        let state = Arc::new(ApiState::new(config.clone(), connector));
        Self {
            config,
            state,
            shutdown: ShutdownSignal::new(),
            port_override: None,
        }
    }

    /// Listen on `port` instead of `server.port`, without touching the
    /// persisted config.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port_override = Some(port);
        self
    }

    /// Returns a handle that can be used to trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn api_state(&self) -> &Arc<ApiState> {
        &self.state
    }

    /// Address from `server.host` and the effective port.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let server = self.config.get().server;
        let port = self.port_override.unwrap_or(server.port);
        format!("{}:{port}", server.host)
            .parse()
            .with_context(|| format!("invalid listen address {}:{port}", server.host))
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        let addr = self.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        self.run_with_listener(listener).await
    }

    /// Serve on a pre-bound listener until shutdown (blocking).
    ///
    /// The caller is responsible for binding the `TcpListener` (e.g. to port 0
    /// for OS-assigned ports).
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let bind_addr = listener.local_addr()?;
        let router = api_router(self.state.clone());
        info!(
            %bind_addr,
            keepalive_secs = self.state.hub.keepalive_interval().as_secs(),
            "API server listening"
        );

        // Event streams never finish on their own; end them once shutdown
        // starts so the graceful drain can complete.
        let shutdown = self.shutdown.clone();
        let hub = self.state.hub.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                hub.close_all();
            })
            .await
            .context("API server error")?;

        self.teardown().await;
        info!("daemon stopped");
        Ok(())
    }

    async fn teardown(&self) {
        if let Err(e) = self.state.remote.disconnect().await {
            warn!(error = %e, "remote teardown on shutdown failed");
        }
    }
}
