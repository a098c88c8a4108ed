//! Shared API types for the tether control plane.
//!
//! Everything here crosses the wire between the backend process and a UI
//! process, in either direction, so both the HTTP server and the network
//! transport client serialize exactly the same shapes. All JSON is camelCase.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel names used on the event stream.
pub mod channels {
    pub const NOTIFICATION_NEW: &str = "notification:new";
    pub const NOTIFICATION_UPDATED: &str = "notification:updated";
    pub const SSH_STATUS: &str = "ssh:status";
    pub const UPDATER_STATUS: &str = "updater:status";
    pub const ZOOM_FACTOR_CHANGED: &str = "zoom-factor-changed";
    pub const MODE_CHANGED: &str = "mode:changed";
}

/// Port the backend listens on when nothing else is configured.
pub const DEFAULT_HTTP_PORT: u16 = 3456;

// ── Envelope ──

/// Uniform `{success, data?, error?}` response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default = "none", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A successful response with no payload (or an absent one, e.g. an
    /// unknown host alias).
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Collapse into a `Result`, using the error text when `success` is false.
    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "request failed without an error message".to_string()))
        }
    }
}

// ── Event stream ──

/// One published event: `{channel, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEvent {
    pub channel: String,
    pub payload: serde_json::Value,
}

// ── Remote connection ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Private key file, `privateKeyPath` required.
    #[default]
    #[serde(alias = "privateKey")]
    Key,
    Password,
    /// Whatever the local SSH agent offers.
    Agent,
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Key => write!(f, "key"),
            AuthMethod::Password => write!(f, "password"),
            AuthMethod::Agent => write!(f, "agent"),
        }
    }
}

fn default_ssh_port() -> u16 {
    22
}

/// Target of a connect or test call. Supplied per call, never persisted whole.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("auth_method", &self.auth_method)
            .field("private_key_path", &self.private_key_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConnectionConfig {
    /// `user@host` destination string.
    pub fn destination(&self) -> String {
        if self.username.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.username, self.host)
        }
    }
}

/// Durable, secret-free projection of a [`ConnectionConfig`].
///
/// There is no password field: deserializing a body that carries one simply
/// drops it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastConnection {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub auth_method: AuthMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<String>,
}

impl From<&ConnectionConfig> for LastConnection {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            auth_method: config.auth_method,
            private_key_path: config.private_key_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of the single remote session's state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connecting(host: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Connecting,
            connected_host: Some(host.into()),
            error: None,
        }
    }

    pub fn connected(host: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Connected,
            connected_host: Some(host.into()),
            error: None,
        }
    }

    pub fn failed(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: ConnectionState::Error,
            connected_host: Some(host.into()),
            error: Some(message.into()),
        }
    }
}

/// Result of looking up one alias in the SSH client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedHostEntry {
    pub alias: String,
    pub resolved_host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveHostRequest {
    pub alias: String,
}

/// Where the application is currently operating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    #[default]
    Local,
    Ssh,
}

impl std::fmt::Display for AppMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppMode::Local => write!(f, "local"),
            AppMode::Ssh => write!(f, "ssh"),
        }
    }
}

// ── Notifications ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// One page of notifications, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsPage {
    pub notifications: Vec<Notification>,
    pub total: usize,
    pub total_count: usize,
    pub unread_count: usize,
    pub has_more: bool,
}

/// Payload of `notification:updated`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCounts {
    pub unread_count: usize,
    pub total: usize,
}

// ── Validation ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePathRequest {
    pub relative_path: String,
    pub project_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PathValidation {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MentionKind {
    #[default]
    Path,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mention {
    #[serde(rename = "type", default)]
    pub kind: MentionKind,
    pub value: String,
}

impl Mention {
    /// Key used in the validation result map, e.g. `@src/main.rs`.
    pub fn key(&self) -> String {
        format!("@{}", self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidateMentionsRequest {
    pub mentions: Vec<Mention>,
    pub project_path: String,
}

/// `@mention` → whether it points at an existing file inside the project.
pub type MentionValidation = BTreeMap<String, bool>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScrollToLineRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub line_number: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScrollToLineResponse {
    pub success: bool,
    pub session_id: String,
    pub line_number: i64,
}

// ── Updater ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStatus {
    #[default]
    Idle,
    Checking,
    Available,
    NotAvailable,
    Downloading,
    Downloaded,
    Error,
}

/// Payload of `updater:status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdaterEvent {
    pub status: UpdateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    /// Download progress in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Misc ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_connection_drops_password_from_body() {
        let body = r#"{"host":"h","port":22,"username":"u","authMethod":"key","privateKeyPath":"/k","password":"secret"}"#;
        let last: LastConnection = serde_json::from_str(body).unwrap();
        let json = serde_json::to_value(&last).unwrap();

        assert!(json.get("password").is_none());
        assert_eq!(json["host"], "h");
        assert_eq!(json["port"], 22);
        assert_eq!(json["username"], "u");
        assert_eq!(json["authMethod"], "key");
        assert_eq!(json["privateKeyPath"], "/k");
    }

    #[test]
    fn connection_config_debug_redacts_password() {
        let cfg = ConnectionConfig {
            host: "example.org".into(),
            port: 22,
            username: "deploy".into(),
            auth_method: AuthMethod::Password,
            private_key_path: None,
            password: Some("hunter2".into()),
        };
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
        assert_eq!(cfg.destination(), "deploy@example.org");
    }

    #[test]
    fn connection_status_serializes_camel_case() {
        let status = ConnectionStatus::connected("box");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "connected");
        assert_eq!(json["connectedHost"], "box");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn envelope_into_result() {
        let ok: ApiEnvelope<u32> = ApiEnvelope::ok(7);
        assert_eq!(ok.into_result(), Ok(Some(7)));

        let empty: ApiEnvelope<u32> = ApiEnvelope::ok_empty();
        assert_eq!(empty.into_result(), Ok(None));

        let err: ApiEnvelope<u32> = ApiEnvelope::err("boom");
        assert_eq!(err.into_result(), Err("boom".to_string()));
    }

    #[test]
    fn auth_method_accepts_private_key_alias() {
        let m: AuthMethod = serde_json::from_str("\"privateKey\"").unwrap();
        assert_eq!(m, AuthMethod::Key);
        assert_eq!(AuthMethod::Agent.to_string(), "agent");
    }

    #[test]
    fn update_status_is_kebab_case() {
        let json = serde_json::to_string(&UpdateStatus::NotAvailable).unwrap();
        assert_eq!(json, "\"not-available\"");
    }
}
