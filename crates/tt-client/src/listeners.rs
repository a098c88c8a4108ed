use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::Mutex;
use serde_json::Value;

/// Callback invoked with the payload of every event on its channel.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Per-channel listener registry shared by every call-surface implementation.
///
/// Any number of listeners may be registered on one channel. Each
/// registration returns a [`Subscription`]; dropping or unsubscribing it
/// removes exactly that listener and nothing else.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    channels: Mutex<AHashMap<String, Vec<(u64, Listener)>>>,
}

impl RegistryInner {
    fn remove(&self, channel: &str, id: u64) {
        let mut channels = self.channels.lock();
        if let Some(list) = channels.get_mut(channel) {
            list.retain(|(lid, _)| *lid != id);
            if list.is_empty() {
                channels.remove(channel);
            }
        }
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `channel`.
    pub fn add(&self, channel: &str, listener: Listener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push((id, listener));
        Subscription {
            registry: Arc::downgrade(&self.inner),
            channel: channel.to_string(),
            id,
            active: true,
        }
    }

    /// Invoke every listener on `channel` with `payload`, returning how many
    /// ran. Listeners are called outside the lock so they may subscribe or
    /// unsubscribe from inside the callback.
    pub fn dispatch(&self, channel: &str, payload: &Value) -> usize {
        let snapshot: Vec<Listener> = match self.inner.channels.lock().get(channel) {
            Some(list) => list.iter().map(|(_, l)| l.clone()).collect(),
            None => return 0,
        };
        for listener in &snapshot {
            listener(payload);
        }
        snapshot.len()
    }

    /// Number of listeners currently registered on `channel`.
    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner
            .channels
            .lock()
            .get(channel)
            .map_or(0, Vec::len)
    }
}

/// Handle for one registered listener. Unregisters on drop.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    registry: Weak<RegistryInner>,
    channel: String,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Unregister now. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(inner) = self.registry.upgrade() {
            inner.remove(&self.channel, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
