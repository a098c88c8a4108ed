use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use tt_api_types::{LastConnection, DEFAULT_HTTP_PORT};

/// Top-level configuration loaded from `~/.tether/config.toml`.
///
/// **Security**: nothing in here holds a password. The only remote-host data
/// persisted is [`LastConnection`], which has no secret field.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Config {
    /// Parse a TOML document and validate it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.keepalive_secs == 0 {
            return Err(ConfigError::Validation(
                "server.keepalive_secs must be at least 1".into(),
            ));
        }
        if self.remote.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "remote.connect_timeout_secs must be at least 1".into(),
            ));
        }
        if self.notifications.max_notifications == 0 {
            return Err(ConfigError::Validation(
                "notifications.max_notifications must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `~/.tether/config.toml`, or `$TETHER_CONFIG` when set.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os("TETHER_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tether")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub log_json: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interval between keepalive comments on the event stream.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    DEFAULT_HTTP_PORT
}
fn default_keepalive_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    /// Upper bound for establishing (or probing) a remote session.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Override for the SSH client config file (default `~/.ssh/config`).
    #[serde(default)]
    pub ssh_config_path: Option<String>,
    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,
    #[serde(default)]
    pub last_connection: Option<LastConnection>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            ssh_config_path: None,
            ssh_binary: default_ssh_binary(),
            last_connection: None,
        }
    }
}

impl RemoteConfig {
    /// The SSH client config file to read host aliases from.
    pub fn resolved_ssh_config_path(&self) -> PathBuf {
        match &self.ssh_config_path {
            Some(p) => PathBuf::from(p),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".ssh")
                .join("config"),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    15
}
fn default_ssh_binary() -> String {
    "ssh".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_notifications: default_max_notifications(),
        }
    }
}

fn default_max_notifications() -> usize {
    100
}
