use std::sync::{Arc, Weak};
use std::time::Duration;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Interval between keepalive frames unless configured otherwise.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// One unit written to a streaming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A published event. `data` is the payload already serialized to JSON.
    Event { channel: Arc<str>, data: Arc<str> },
    /// Comment-only keepalive.
    KeepAlive,
}

impl Frame {
    /// Wire form on a `text/event-stream` body.
    pub fn encode(&self) -> String {
        match self {
            Frame::Event { channel, data } => format!("event: {channel}\ndata: {data}\n\n"),
            Frame::KeepAlive => ":ping\n\n".to_string(),
        }
    }
}

struct Registered {
    tx: flume::Sender<Frame>,
    opened_at: DateTime<Utc>,
    keepalive: JoinHandle<()>,
}

struct HubInner {
    connections: Mutex<AHashMap<ConnectionId, Registered>>,
    keepalive: Duration,
}

impl HubInner {
    fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.connections.lock().remove(&id);
        match removed {
            Some(reg) => {
                reg.keepalive.abort();
                true
            }
            None => false,
        }
    }
}

/// Broadcast hub for streaming connections.
///
/// Every [`subscribe`](Self::subscribe) registers one connection with its
/// own keepalive timer. [`publish`](Self::publish) writes one frame to each
/// connection open at that instant and prunes the ones whose write failed.
/// Nothing is buffered for connections that subscribe later.
///
/// Cloning is cheap; every clone addresses the same registry.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_keepalive(DEFAULT_KEEPALIVE)
    }

    pub fn with_keepalive(keepalive: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: Mutex::new(AHashMap::new()),
                keepalive,
            }),
        }
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.inner.keepalive
    }

    /// Register a new streaming connection.
    ///
    /// Must be called from within a Tokio runtime: the keepalive timer is a
    /// spawned task that lives until the connection is unsubscribed.
    pub fn subscribe(&self) -> StreamingConnection {
        let id = Uuid::new_v4();
        let opened_at = Utc::now();
        let (tx, rx) = flume::unbounded();

        let keepalive = tokio::spawn(keepalive_loop(
            Arc::downgrade(&self.inner),
            id,
            tx.clone(),
            self.inner.keepalive,
        ));

        let total = {
            let mut conns = self.inner.connections.lock();
            conns.insert(
                id,
                Registered {
                    tx,
                    opened_at,
                    keepalive,
                },
            );
            conns.len()
        };
        info!(%id, total, "stream client connected");

        StreamingConnection {
            id,
            opened_at,
            rx,
            hub: self.clone(),
            registered: true,
        }
    }

    /// Serialize `payload` once and write it to every open connection.
    ///
    /// Returns the number of successful writes. Connections whose write
    /// fails are removed; the failure never reaches the caller.
    pub fn publish<T: Serialize + ?Sized>(&self, channel: &str, payload: &T) -> usize {
        let data = match serde_json::to_string(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!(channel, error = %e, "dropping unserializable event");
                return 0;
            }
        };
        let frame = Frame::Event {
            channel: Arc::from(channel),
            data: Arc::from(data),
        };

        // Snapshot so concurrent subscribe/unsubscribe never see a torn map.
        let targets: Vec<(ConnectionId, flume::Sender<Frame>)> = self
            .inner
            .connections
            .lock()
            .iter()
            .map(|(id, reg)| (*id, reg.tx.clone()))
            .collect();

        let mut written = 0;
        let mut dead = Vec::new();
        for (id, tx) in targets {
            if tx.send(frame.clone()).is_ok() {
                written += 1;
            } else {
                dead.push(id);
            }
        }

        for id in dead {
            if self.inner.remove(id) {
                warn!(%id, channel, "pruned dead stream client");
            }
        }
        debug!(channel, written, "event published");
        written
    }

    /// Remove a connection and stop its keepalive. Safe to call repeatedly;
    /// only the first call has an effect. Returns whether it did.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        let removed = self.inner.remove(id);
        if removed {
            info!(%id, total = self.connection_count(), "stream client disconnected");
        }
        removed
    }

    /// Drop every connection. Their streams end once the queued frames are
    /// drained. Returns how many were open.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Registered> = self
            .inner
            .connections
            .lock()
            .drain()
            .map(|(_, reg)| reg)
            .collect();
        for reg in &drained {
            reg.keepalive.abort();
        }
        if !drained.is_empty() {
            info!(closed = drained.len(), "all stream clients closed");
        }
        drained.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.lock().len()
    }

    pub fn is_subscribed(&self, id: ConnectionId) -> bool {
        self.inner.connections.lock().contains_key(&id)
    }

    /// Open timestamps of every live connection, oldest first.
    pub fn connections(&self) -> Vec<(ConnectionId, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .inner
            .connections
            .lock()
            .iter()
            .map(|(id, reg)| (*id, reg.opened_at))
            .collect();
        out.sort_by_key(|(_, at)| *at);
        out
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

async fn keepalive_loop(
    hub: Weak<HubInner>,
    id: ConnectionId,
    tx: flume::Sender<Frame>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        if tx.send(Frame::KeepAlive).is_err() {
            if let Some(inner) = hub.upgrade() {
                if inner.remove(id) {
                    debug!(%id, "stream client gone, keepalive stopped");
                }
            }
            return;
        }
    }
}

/// Handle to one registered connection.
///
/// Dropping it unsubscribes, so a stream built from it cleans up whenever
/// the HTTP layer drops the response body.
pub struct StreamingConnection {
    id: ConnectionId,
    opened_at: DateTime<Utc>,
    rx: flume::Receiver<Frame>,
    hub: EventHub,
    registered: bool,
}

impl StreamingConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Next frame, or `None` once the hub has dropped this connection.
    pub async fn recv(&self) -> Option<Frame> {
        self.rx.recv_async().await.ok()
    }

    /// Frame already queued, without waiting.
    pub fn try_recv(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Turn the connection into a stream of frames. The connection stays
    /// registered for as long as the stream is alive.
    pub fn into_stream(self) -> impl Stream<Item = Frame> + Send + 'static {
        stream::unfold(self, |conn| async move {
            let frame = conn.recv().await?;
            Some((frame, conn))
        })
    }

    /// Give up the unsubscribe-on-drop guard and return the raw receiver.
    /// The caller becomes responsible for calling
    /// [`EventHub::unsubscribe`]; until then a dropped receiver is only
    /// noticed on the next write.
    pub fn into_parts(mut self) -> (ConnectionId, flume::Receiver<Frame>) {
        self.registered = false;
        let (_, placeholder) = flume::bounded(0);
        let rx = std::mem::replace(&mut self.rx, placeholder);
        (self.id, rx)
    }

    /// Unsubscribe now. Equivalent to dropping the handle.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.hub.unsubscribe(self.id);
        }
    }
}

impl Drop for StreamingConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_wire_format() {
        let frame = Frame::Event {
            channel: Arc::from("ssh:status"),
            data: Arc::from(r#"{"state":"connected"}"#),
        };
        assert_eq!(
            frame.encode(),
            "event: ssh:status\ndata: {\"state\":\"connected\"}\n\n"
        );
        assert_eq!(Frame::KeepAlive.encode(), ":ping\n\n");
    }

    #[tokio::test]
    async fn publish_with_no_connections_is_a_no_op() {
        let hub = EventHub::new();
        assert_eq!(hub.publish("notification:new", &json!({"id": "n1"})), 0);
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let hub = EventHub::new();
        let conn = hub.subscribe();
        let id = conn.id();
        assert!(hub.is_subscribed(id));
        drop(conn);
        assert!(!hub.is_subscribed(id));
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn into_stream_keeps_registration_until_dropped() {
        use futures_util::StreamExt;

        let hub = EventHub::new();
        let mut frames = Box::pin(hub.subscribe().into_stream());
        assert_eq!(hub.connection_count(), 1);

        hub.publish("zoom-factor-changed", &1.25);
        let frame = frames.next().await.unwrap();
        assert_eq!(
            frame,
            Frame::Event {
                channel: Arc::from("zoom-factor-changed"),
                data: Arc::from("1.25"),
            }
        );

        drop(frames);
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn connections_lists_open_handles() {
        let hub = EventHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        let ids: Vec<_> = hub.connections().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a.id()) && ids.contains(&b.id()));
    }
}
