use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use tt_api_types::{
    ApiEnvelope, AppMode, ConnectionConfig, ConnectionStatus, LastConnection, Mention,
    MentionValidation, NotificationsPage, PathValidation, ResolveHostRequest, ResolvedHostEntry,
    ScrollToLineRequest, ScrollToLineResponse, TestConnectionResult, ValidateMentionsRequest,
    ValidatePathRequest,
};

use crate::error::{Result, TransportError};
use crate::listeners::{Listener, ListenerRegistry, Subscription};
use crate::sse::{SseDecoder, SseFrame};
use crate::surface::{CallSurface, TransportKind};

/// Path of the server's event stream.
pub const EVENTS_PATH: &str = "/api/events";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Stream health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Connecting,
    Connected,
    Disconnected,
}

/// Backoff schedule for re-opening a dropped event stream.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    /// An open stream that yields nothing for this long (not even a
    /// keepalive) is treated as dead and re-opened.
    pub idle_timeout: Duration,
}

impl Default for ReconnectPolicy {
    /// 1s, 2s, 4s, 8s, then 16s between attempts. Idle after two missed
    /// 30s keepalives.
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(16),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// Network transport client.
///
/// Every call is one HTTP request/response. Push events arrive over one
/// event stream opened at construction and re-opened with backoff whenever
/// it drops. Calls never depend on stream health: while the stream is down,
/// listeners simply miss events.
///
/// Must be constructed inside a Tokio runtime. Dropping the transport stops
/// the stream task.
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
    listeners: ListenerRegistry,
    stream_state: watch::Receiver<StreamState>,
    stream_task: JoinHandle<()>,
}

impl HttpTransport {
    /// Transport for a backend on `127.0.0.1:<port>`.
    pub fn for_port(port: u16) -> Result<Self> {
        Self::new(&format!("http://127.0.0.1:{port}"))
    }

    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_policy(base_url, ReconnectPolicy::default())
    }

    pub fn with_policy(base_url: &str, policy: ReconnectPolicy) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| TransportError::Http(format!("invalid base url {base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let listeners = ListenerRegistry::new();
        let (state_tx, stream_state) = watch::channel(StreamState::Connecting);

        let events_url = base
            .join(EVENTS_PATH)
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let stream_task = tokio::spawn(run_event_stream(
            client.clone(),
            events_url,
            listeners.clone(),
            state_tx,
            policy,
        ));
        info!(base = %base, "http transport created");

        Ok(Self {
            base,
            client,
            listeners,
            stream_state,
            stream_task,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Current health of the event stream.
    pub fn stream_state(&self) -> StreamState {
        *self.stream_state.borrow()
    }

    /// Receiver that observes every stream state change.
    pub fn watch_stream_state(&self) -> watch::Receiver<StreamState> {
        self.stream_state.clone()
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    // ---- Request helpers --------------------------------------------------

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Http(format!("base url {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        let mut req = self
            .client
            .request(method, url)
            .timeout(REQUEST_TIMEOUT)
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| TransportError::Serialization(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.request::<(), T>(Method::GET, segments, &[], None).await
    }

    async fn post<B, T>(&self, segments: &[&str], body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, segments, &[], body).await
    }

    async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.request::<(), T>(Method::DELETE, segments, &[], None).await
    }

    /// POST returning an envelope; a `success:false` answer becomes
    /// [`TransportError::Remote`].
    async fn post_envelope<B, T>(&self, segments: &[&str], body: Option<&B>) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let envelope: ApiEnvelope<T> = self.post(segments, body).await?;
        envelope.into_result().map_err(TransportError::Remote)
    }

    async fn get_envelope<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>> {
        let envelope: ApiEnvelope<T> = self.get(segments).await?;
        envelope.into_result().map_err(TransportError::Remote)
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        self.stream_task.abort();
    }
}

/// Log a failed call and fall back to the safe default.
fn degrade<T: Default>(op: &str, result: Result<T>) -> T {
    degrade_to(op, result, T::default())
}

fn degrade_to<T>(op: &str, result: Result<T>, fallback: T) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            warn!(op, error = %e, "call failed, using safe default");
            fallback
        }
    }
}

fn required<T>(op: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| TransportError::Serialization(format!("{op}: response carried no data")))
}

#[derive(Deserialize)]
struct Flag(bool);

#[async_trait]
impl CallSurface for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn get_notifications(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> NotificationsPage {
        let mut query = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        degrade(
            "get_notifications",
            self.request::<(), _>(Method::GET, &["api", "notifications"], &query, None)
                .await,
        )
    }

    async fn mark_notification_read(&self, id: &str) -> bool {
        degrade(
            "mark_notification_read",
            self.post::<(), Flag>(&["api", "notifications", id, "read"], None)
                .await
                .map(|f| f.0),
        )
    }

    async fn mark_all_notifications_read(&self) -> bool {
        degrade(
            "mark_all_notifications_read",
            self.post::<(), Flag>(&["api", "notifications", "read-all"], None)
                .await
                .map(|f| f.0),
        )
    }

    async fn delete_notification(&self, id: &str) -> bool {
        degrade(
            "delete_notification",
            self.delete::<Flag>(&["api", "notifications", id])
                .await
                .map(|f| f.0),
        )
    }

    async fn clear_notifications(&self) -> bool {
        degrade(
            "clear_notifications",
            self.delete::<Flag>(&["api", "notifications"])
                .await
                .map(|f| f.0),
        )
    }

    async fn unread_notification_count(&self) -> usize {
        degrade(
            "unread_notification_count",
            self.get(&["api", "notifications", "unread-count"]).await,
        )
    }

    async fn remote_connect(&self, config: ConnectionConfig) -> Result<ConnectionStatus> {
        let status = self
            .post_envelope(&["api", "remote", "connect"], Some(&config))
            .await?;
        required("remote_connect", status)
    }

    async fn remote_disconnect(&self) -> Result<ConnectionStatus> {
        let status = self
            .post_envelope::<(), _>(&["api", "remote", "disconnect"], None)
            .await?;
        required("remote_disconnect", status)
    }

    async fn remote_status(&self) -> ConnectionStatus {
        degrade("remote_status", self.get(&["api", "remote", "state"]).await)
    }

    async fn remote_test(&self, config: ConnectionConfig) -> Result<TestConnectionResult> {
        let result = self
            .post_envelope(&["api", "remote", "test"], Some(&config))
            .await?;
        required("remote_test", result)
    }

    async fn remote_config_hosts(&self) -> Vec<String> {
        degrade(
            "remote_config_hosts",
            self.get_envelope(&["api", "remote", "config-hosts"])
                .await
                .map(Option::unwrap_or_default),
        )
    }

    async fn remote_resolve_host(&self, alias: &str) -> Option<ResolvedHostEntry> {
        let body = ResolveHostRequest {
            alias: alias.to_string(),
        };
        degrade(
            "remote_resolve_host",
            self.post_envelope(&["api", "remote", "resolve-host"], Some(&body))
                .await,
        )
    }

    async fn save_last_connection(&self, last: LastConnection) -> bool {
        degrade(
            "save_last_connection",
            self.post_envelope::<_, Value>(&["api", "remote", "save-last-connection"], Some(&last))
                .await
                .map(|_| true),
        )
    }

    async fn last_connection(&self) -> Option<LastConnection> {
        degrade(
            "last_connection",
            self.get_envelope(&["api", "remote", "last-connection"])
                .await,
        )
    }

    async fn validate_path(&self, relative_path: &str, project_path: &str) -> PathValidation {
        let body = ValidatePathRequest {
            relative_path: relative_path.to_string(),
            project_path: project_path.to_string(),
        };
        degrade(
            "validate_path",
            self.post(&["api", "validate", "path"], Some(&body)).await,
        )
    }

    async fn validate_mentions(
        &self,
        mentions: Vec<Mention>,
        project_path: &str,
    ) -> MentionValidation {
        let body = ValidateMentionsRequest {
            mentions,
            project_path: project_path.to_string(),
        };
        degrade(
            "validate_mentions",
            self.post(&["api", "validate", "mentions"], Some(&body))
                .await,
        )
    }

    async fn scroll_to_line(&self, session_id: &str, line_number: i64) -> ScrollToLineResponse {
        let body = ScrollToLineRequest {
            session_id: session_id.to_string(),
            line_number,
        };
        degrade(
            "scroll_to_line",
            self.post(&["api", "session", "scroll-to-line"], Some(&body))
                .await,
        )
    }

    async fn check_for_updates(&self) -> Result<()> {
        self.post_envelope::<(), Value>(&["api", "updater", "check"], None)
            .await
            .map(|_| ())
    }

    async fn download_update(&self) -> Result<()> {
        self.post_envelope::<(), Value>(&["api", "updater", "download"], None)
            .await
            .map(|_| ())
    }

    async fn install_update(&self) -> Result<()> {
        self.post_envelope::<(), Value>(&["api", "updater", "install"], None)
            .await
            .map(|_| ())
    }

    async fn get_zoom_factor(&self) -> f64 {
        degrade_to(
            "get_zoom_factor",
            self.get(&["api", "zoom-factor"]).await,
            1.0,
        )
    }

    async fn get_mode(&self) -> AppMode {
        degrade("get_mode", self.get(&["api", "mode"]).await)
    }

    fn on(&self, channel: &str, listener: Listener) -> Subscription {
        self.listeners.add(channel, listener)
    }
}

// ---------------------------------------------------------------------------
// Event stream loop
// ---------------------------------------------------------------------------

async fn run_event_stream(
    client: reqwest::Client,
    url: Url,
    listeners: ListenerRegistry,
    state: watch::Sender<StreamState>,
    policy: ReconnectPolicy,
) {
    let mut backoff = policy.initial;
    loop {
        state.send_replace(StreamState::Connecting);
        match client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                state.send_replace(StreamState::Connected);
                backoff = policy.initial;
                debug!(%url, "event stream open");

                let mut decoder = SseDecoder::new();
                let mut body = resp.bytes_stream();
                loop {
                    match tokio::time::timeout(policy.idle_timeout, body.next()).await {
                        Ok(Some(Ok(bytes))) => {
                            for frame in decoder.push(&bytes) {
                                dispatch_frame(&listeners, frame);
                            }
                        }
                        Ok(Some(Err(e))) => {
                            warn!(error = %e, "event stream read failed");
                            break;
                        }
                        Ok(None) => break,
                        Err(_) => {
                            warn!(
                                idle_secs = policy.idle_timeout.as_secs(),
                                "event stream went quiet, reopening"
                            );
                            break;
                        }
                    }
                }
                info!(%url, "event stream closed");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "event stream rejected");
            }
            Err(e) => {
                debug!(error = %e, "event stream connect failed");
            }
        }

        state.send_replace(StreamState::Disconnected);
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(policy.max);
    }
}

fn dispatch_frame(listeners: &ListenerRegistry, frame: SseFrame) {
    match frame {
        SseFrame::Event { event, data } => {
            let payload =
                serde_json::from_str::<Value>(&data).unwrap_or_else(|_| json!(data));
            let n = listeners.dispatch(&event, &payload);
            trace!(channel = %event, listeners = n, "event dispatched");
        }
        SseFrame::Comment(text) => {
            trace!(comment = %text, "keepalive");
        }
    }
}
