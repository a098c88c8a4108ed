//! Remote host session management.
//!
//! - [`manager`]: the connection state machine and last-connection persistence
//! - [`ssh`]: OpenSSH-backed connector using a ControlMaster socket
//! - [`host_config`]: alias discovery from the SSH client config

pub mod host_config;
pub mod manager;
pub mod ssh;

use async_trait::async_trait;

use tt_api_types::{AppMode, ConnectionConfig, ConnectionState};

pub use host_config::SshConfig;
pub use manager::{RemoteConnectionManager, StatusListener};
pub use ssh::OpenSshConnector;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("a remote connection is already {0}")]
    AlreadyActive(ConnectionState),

    #[error("invalid connection config: {0}")]
    InvalidConfig(String),

    #[error("connection to {host} timed out after {secs}s")]
    Timeout { host: String, secs: u64 },

    /// Message from the transport itself, e.g. `ssh` stderr.
    #[error("{0}")]
    Connect(String),

    #[error("connection to {0} was abandoned by a disconnect")]
    Abandoned(String),

    #[error("session teardown failed: {0}")]
    Teardown(String),

    #[error("mode switch failed: {0}")]
    ModeSwitch(String),

    #[error("could not persist connection: {0}")]
    Persist(String),
}

/// Opens sessions to remote hosts.
#[async_trait]
pub trait RemoteConnector: Send + Sync + 'static {
    /// Establish a session. The caller bounds this with its own timeout and
    /// may drop the future at any point.
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// One established session.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    fn host(&self) -> &str;

    async fn close(self: Box<Self>) -> Result<(), RemoteError>;
}

/// Invoked once after every successful connect (`Ssh`) and disconnect
/// (`Local`), and awaited before the operation returns.
#[async_trait]
pub trait ModeSwitchHook: Send + Sync + 'static {
    async fn switch_mode(&self, mode: AppMode) -> Result<(), RemoteError>;
}
