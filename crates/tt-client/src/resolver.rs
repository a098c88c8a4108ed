use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use tt_api_types::{
    AppMode, ConnectionConfig, ConnectionStatus, LastConnection, Mention, MentionValidation,
    NotificationsPage, PathValidation, ResolvedHostEntry, ScrollToLineResponse,
    TestConnectionResult, DEFAULT_HTTP_PORT,
};

use crate::error::{Result, TransportError};
use crate::http_transport::HttpTransport;
use crate::listeners::{Listener, Subscription};
use crate::surface::{CallSurface, TransportKind};

/// Builds the network transport for a port. Replaceable in tests.
pub type TransportFactory = Box<dyn Fn(u16) -> Arc<dyn CallSurface> + Send + Sync>;

/// What the hosting process provides before any application code runs.
#[derive(Clone, Default)]
pub struct HostEnvironment {
    /// In-process bridge, present only when embedded in the native shell.
    pub bridge: Option<Arc<dyn CallSurface>>,
    /// Query string of the current page, e.g. `port=4000&tab=2`.
    pub page_query: String,
}

impl HostEnvironment {
    pub fn embedded(bridge: Arc<dyn CallSurface>) -> Self {
        Self {
            bridge: Some(bridge),
            page_query: String::new(),
        }
    }

    pub fn browser(page_query: impl Into<String>) -> Self {
        Self {
            bridge: None,
            page_query: page_query.into(),
        }
    }
}

/// Read `port` from a page query string, falling back to
/// [`DEFAULT_HTTP_PORT`] when absent, unparseable or zero.
pub fn port_from_query(query: &str) -> u16 {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "port")
        .and_then(|(_, v)| v.parse::<u16>().ok())
        .filter(|p| *p != 0)
        .unwrap_or(DEFAULT_HTTP_PORT)
}

fn http_factory() -> TransportFactory {
    Box::new(|port| -> Arc<dyn CallSurface> {
        match HttpTransport::for_port(port) {
            Ok(t) => Arc::new(t) as Arc<dyn CallSurface>,
            Err(e) => {
                // for_port only fails on a malformed base URL, which a u16
                // port cannot produce.
                warn!(port, error = %e, "http transport construction failed");
                Arc::new(Unavailable(e))
            }
        }
    })
}

/// Decides once per process which implementation backs the call surface.
///
/// With a bridge present it is returned as is. Otherwise exactly one
/// network transport is built on first use and handed out on every later
/// call, so there is never more than one event stream per process.
pub struct TransportResolver {
    bridge: Option<Arc<dyn CallSurface>>,
    page_query: String,
    http: OnceLock<Arc<dyn CallSurface>>,
    factory: TransportFactory,
}

impl TransportResolver {
    pub fn new(env: HostEnvironment) -> Self {
        Self::with_factory(env, http_factory())
    }

    pub fn with_factory(env: HostEnvironment, factory: TransportFactory) -> Self {
        Self {
            bridge: env.bridge,
            page_query: env.page_query,
            http: OnceLock::new(),
            factory,
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.bridge.is_some()
    }

    pub fn resolve(&self) -> Arc<dyn CallSurface> {
        if let Some(bridge) = &self.bridge {
            return Arc::clone(bridge);
        }
        Arc::clone(self.http.get_or_init(|| {
            let port = port_from_query(&self.page_query);
            info!(port, "no in-process bridge, using http transport");
            (self.factory)(port)
        }))
    }

    /// Whether the network transport has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.http.get().is_some()
    }
}

/// Stand-in used when the network transport cannot be built.
struct Unavailable(TransportError);

#[async_trait]
impl CallSurface for Unavailable {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }
    async fn get_notifications(&self, _: Option<u32>, _: Option<u32>) -> NotificationsPage {
        NotificationsPage::default()
    }
    async fn mark_notification_read(&self, _: &str) -> bool {
        false
    }
    async fn mark_all_notifications_read(&self) -> bool {
        false
    }
    async fn delete_notification(&self, _: &str) -> bool {
        false
    }
    async fn clear_notifications(&self) -> bool {
        false
    }
    async fn unread_notification_count(&self) -> usize {
        0
    }
    async fn remote_connect(&self, _: ConnectionConfig) -> Result<ConnectionStatus> {
        Err(self.0.clone())
    }
    async fn remote_disconnect(&self) -> Result<ConnectionStatus> {
        Err(self.0.clone())
    }
    async fn remote_status(&self) -> ConnectionStatus {
        ConnectionStatus::disconnected()
    }
    async fn remote_test(&self, _: ConnectionConfig) -> Result<TestConnectionResult> {
        Err(self.0.clone())
    }
    async fn remote_config_hosts(&self) -> Vec<String> {
        Vec::new()
    }
    async fn remote_resolve_host(&self, _: &str) -> Option<ResolvedHostEntry> {
        None
    }
    async fn save_last_connection(&self, _: LastConnection) -> bool {
        false
    }
    async fn last_connection(&self) -> Option<LastConnection> {
        None
    }
    async fn validate_path(&self, _: &str, _: &str) -> PathValidation {
        PathValidation::default()
    }
    async fn validate_mentions(&self, _: Vec<Mention>, _: &str) -> MentionValidation {
        MentionValidation::new()
    }
    async fn scroll_to_line(&self, session_id: &str, line_number: i64) -> ScrollToLineResponse {
        ScrollToLineResponse {
            success: false,
            session_id: session_id.to_string(),
            line_number,
        }
    }
    async fn check_for_updates(&self) -> Result<()> {
        Err(self.0.clone())
    }
    async fn download_update(&self) -> Result<()> {
        Err(self.0.clone())
    }
    async fn install_update(&self) -> Result<()> {
        Err(self.0.clone())
    }
    async fn get_zoom_factor(&self) -> f64 {
        1.0
    }
    async fn get_mode(&self) -> AppMode {
        AppMode::Local
    }
    fn on(&self, channel: &str, listener: Listener) -> Subscription {
        crate::listeners::ListenerRegistry::new().add(channel, listener)
    }
}

// ---------------------------------------------------------------------------
// Api: forwarding handle
// ---------------------------------------------------------------------------

/// Cheap, cloneable handle consumers hold instead of a concrete transport.
///
/// Every call resolves first and then delegates, so a handle cloned or
/// stored before the transport existed still reaches the one instance the
/// resolver settles on.
#[derive(Clone)]
pub struct Api {
    resolver: Arc<TransportResolver>,
}

impl Api {
    pub fn new(resolver: Arc<TransportResolver>) -> Self {
        Self { resolver }
    }

    pub fn from_env(env: HostEnvironment) -> Self {
        Self::new(Arc::new(TransportResolver::new(env)))
    }

    pub fn resolver(&self) -> &Arc<TransportResolver> {
        &self.resolver
    }

    fn target(&self) -> Arc<dyn CallSurface> {
        let target = self.resolver.resolve();
        debug!(kind = %target.kind(), "api call");
        target
    }
}

#[async_trait]
impl CallSurface for Api {
    fn kind(&self) -> TransportKind {
        self.resolver.resolve().kind()
    }

    async fn get_notifications(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> NotificationsPage {
        self.target().get_notifications(limit, offset).await
    }

    async fn mark_notification_read(&self, id: &str) -> bool {
        self.target().mark_notification_read(id).await
    }

    async fn mark_all_notifications_read(&self) -> bool {
        self.target().mark_all_notifications_read().await
    }

    async fn delete_notification(&self, id: &str) -> bool {
        self.target().delete_notification(id).await
    }

    async fn clear_notifications(&self) -> bool {
        self.target().clear_notifications().await
    }

    async fn unread_notification_count(&self) -> usize {
        self.target().unread_notification_count().await
    }

    async fn remote_connect(&self, config: ConnectionConfig) -> Result<ConnectionStatus> {
        self.target().remote_connect(config).await
    }

    async fn remote_disconnect(&self) -> Result<ConnectionStatus> {
        self.target().remote_disconnect().await
    }

    async fn remote_status(&self) -> ConnectionStatus {
        self.target().remote_status().await
    }

    async fn remote_test(&self, config: ConnectionConfig) -> Result<TestConnectionResult> {
        self.target().remote_test(config).await
    }

    async fn remote_config_hosts(&self) -> Vec<String> {
        self.target().remote_config_hosts().await
    }

    async fn remote_resolve_host(&self, alias: &str) -> Option<ResolvedHostEntry> {
        self.target().remote_resolve_host(alias).await
    }

    async fn save_last_connection(&self, last: LastConnection) -> bool {
        self.target().save_last_connection(last).await
    }

    async fn last_connection(&self) -> Option<LastConnection> {
        self.target().last_connection().await
    }

    async fn validate_path(&self, relative_path: &str, project_path: &str) -> PathValidation {
        self.target()
            .validate_path(relative_path, project_path)
            .await
    }

    async fn validate_mentions(
        &self,
        mentions: Vec<Mention>,
        project_path: &str,
    ) -> MentionValidation {
        self.target()
            .validate_mentions(mentions, project_path)
            .await
    }

    async fn scroll_to_line(&self, session_id: &str, line_number: i64) -> ScrollToLineResponse {
        self.target().scroll_to_line(session_id, line_number).await
    }

    async fn check_for_updates(&self) -> Result<()> {
        self.target().check_for_updates().await
    }

    async fn download_update(&self) -> Result<()> {
        self.target().download_update().await
    }

    async fn install_update(&self) -> Result<()> {
        self.target().install_update().await
    }

    async fn get_zoom_factor(&self) -> f64 {
        self.target().get_zoom_factor().await
    }

    async fn get_mode(&self) -> AppMode {
        self.target().get_mode().await
    }

    fn on(&self, channel: &str, listener: Listener) -> Subscription {
        self.resolver.resolve().on(channel, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_from_query_parses_and_defaults() {
        assert_eq!(port_from_query("port=4000"), 4000);
        assert_eq!(port_from_query("?tab=2&port=5001"), 5001);
        assert_eq!(port_from_query(""), DEFAULT_HTTP_PORT);
        assert_eq!(port_from_query("port=abc"), DEFAULT_HTTP_PORT);
        assert_eq!(port_from_query("port=0"), DEFAULT_HTTP_PORT);
        assert_eq!(port_from_query("port=70000"), DEFAULT_HTTP_PORT);
    }

    #[tokio::test]
    async fn unavailable_surface_degrades() {
        let u = Unavailable(TransportError::Http("down".into()));
        assert_eq!(u.unread_notification_count().await, 0);
        assert!(u.remote_config_hosts().await.is_empty());
        assert_eq!(
            u.check_for_updates().await,
            Err(TransportError::Http("down".into()))
        );
    }
}
