use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use tt_api_types::{channels, Notification, NotificationCounts, NotificationKind, NotificationsPage};

use crate::event_hub::EventHub;

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 200;
const MAX_ID_LEN: usize = 128;

/// Coerce a requested page size into `1..=MAX_PAGE_LIMIT`.
pub fn coerce_limit(raw: Option<i64>) -> usize {
    match raw {
        Some(n) if n >= 1 => (n as u64).min(MAX_PAGE_LIMIT as u64) as usize,
        Some(_) => 1,
        None => DEFAULT_PAGE_LIMIT,
    }
}

/// Negative or missing offsets become zero.
pub fn coerce_offset(raw: Option<i64>) -> usize {
    match raw {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => 0,
    }
}

/// Parse a query-string number leniently: anything that is not a finite
/// number is treated as absent. Fractions are truncated.
pub fn parse_query_number(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidId {
    #[error("notification id is empty")]
    Empty,
    #[error("notification id exceeds 128 characters")]
    TooLong,
    #[error("notification id contains invalid characters")]
    BadCharacters,
}

/// Reject ids that could not have been minted by the center.
pub fn validate_notification_id(id: &str) -> Result<&str, InvalidId> {
    let id = id.trim();
    if id.is_empty() {
        return Err(InvalidId::Empty);
    }
    if id.len() > MAX_ID_LEN {
        return Err(InvalidId::TooLong);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(InvalidId::BadCharacters);
    }
    Ok(id)
}

/// In-memory notification store that announces every change on the hub.
///
/// Newest entries come first. Once `max` entries are held, adding evicts
/// the oldest.
pub struct NotificationCenter {
    items: RwLock<VecDeque<Notification>>,
    max: usize,
    hub: EventHub,
}

impl NotificationCenter {
    pub fn new(hub: EventHub, max: usize) -> Self {
        Self {
            items: RwLock::new(VecDeque::new()),
            max: max.max(1),
            hub,
        }
    }

    pub fn add(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Notification {
        let n = Notification {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
            read: false,
        };
        {
            let mut items = self.items.write();
            items.push_front(n.clone());
            while items.len() > self.max {
                items.pop_back();
            }
        }
        debug!(id = %n.id, ?kind, "notification added");
        self.hub.publish(channels::NOTIFICATION_NEW, &n);
        self.publish_counts();
        n
    }

    pub fn page(&self, limit: usize, offset: usize) -> NotificationsPage {
        let items = self.items.read();
        let total = items.len();
        let notifications: Vec<Notification> =
            items.iter().skip(offset).take(limit).cloned().collect();
        NotificationsPage {
            has_more: offset.saturating_add(notifications.len()) < total,
            notifications,
            total,
            total_count: total,
            unread_count: items.iter().filter(|n| !n.read).count(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.items.read().iter().find(|n| n.id == id).cloned()
    }

    /// Returns `false` when no notification has this id.
    pub fn mark_read(&self, id: &str) -> bool {
        let changed = {
            let mut items = self.items.write();
            match items.iter_mut().find(|n| n.id == id) {
                Some(n) => {
                    n.read = true;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.publish_counts();
        }
        changed
    }

    pub fn mark_all_read(&self) -> bool {
        for n in self.items.write().iter_mut() {
            n.read = true;
        }
        self.publish_counts();
        true
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = {
            let mut items = self.items.write();
            let before = items.len();
            items.retain(|n| n.id != id);
            items.len() != before
        };
        if removed {
            self.publish_counts();
        }
        removed
    }

    pub fn clear_all(&self) -> bool {
        self.items.write().clear();
        self.publish_counts();
        true
    }

    pub fn unread_count(&self) -> usize {
        self.items.read().iter().filter(|n| !n.read).count()
    }

    pub fn counts(&self) -> NotificationCounts {
        let items = self.items.read();
        NotificationCounts {
            unread_count: items.iter().filter(|n| !n.read).count(),
            total: items.len(),
        }
    }

    fn publish_counts(&self) {
        let counts = self.counts();
        self.hub.publish(channels::NOTIFICATION_UPDATED, &counts);
    }
}

/// Validate `id`, logging the rejection under `op`.
pub(crate) fn checked_id<'a>(op: &str, id: &'a str) -> Option<&'a str> {
    match validate_notification_id(id) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(op, error = %e, "notification id rejected");
            None
        }
    }
}
