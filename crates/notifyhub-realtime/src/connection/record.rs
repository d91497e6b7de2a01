//! Per-connection state held by the client registry.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use notifyhub_core::types::{ConnectionId, NotificationId, UserId};
use notifyhub_entity::{Notification, UserRole};

use super::outbox::Outbox;
use crate::message::types::OutboundMessage;
use crate::scheduler::priority::{DEFAULT_PRIORITY, clamp_priority};

/// A registered connection.
///
/// `user_id` and `role` are fixed at registration. Priority, visibility,
/// and the cursor are mutated concurrently by the handler and the
/// scheduler.
#[derive(Debug)]
pub struct ConnectionRecord {
    /// Unique connection ID
    pub id: ConnectionId,
    /// User who owns this connection
    pub user_id: UserId,
    /// Role reported at registration
    pub role: Option<UserRole>,
    /// When the connection registered
    pub connected_at: DateTime<Utc>,
    outbox: Outbox,
    priority: AtomicU8,
    active: AtomicBool,
    last_fetch: RwLock<DateTime<Utc>>,
    /// Ids already pushed that can still show up in an overlapping fetch.
    recent: std::sync::Mutex<HashMap<NotificationId, DateTime<Utc>>>,
    delivery_lock: Mutex<()>,
}

impl ConnectionRecord {
    /// Create a record with priority 5, active, and the cursor at `now`.
    pub fn new(
        id: ConnectionId,
        user_id: UserId,
        role: Option<UserRole>,
        outbox: Outbox,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            role,
            connected_at: now,
            outbox,
            priority: AtomicU8::new(DEFAULT_PRIORITY),
            active: AtomicBool::new(true),
            last_fetch: RwLock::new(now),
            recent: std::sync::Mutex::new(HashMap::new()),
            delivery_lock: Mutex::new(()),
        }
    }

    /// Queue a message to this connection.
    pub fn send(&self, msg: OutboundMessage) -> bool {
        self.outbox.send(msg)
    }

    /// Whether the transport is still there.
    pub fn is_open(&self) -> bool {
        !self.outbox.is_closed()
    }

    /// Ask the transport to close.
    pub fn close(&self) {
        self.outbox.close();
    }

    /// Current priority (1..=10).
    pub fn priority(&self) -> u8 {
        self.priority.load(Ordering::SeqCst)
    }

    /// Set the priority, clamped into 1..=10. Returns the stored value.
    pub fn set_priority(&self, priority: i64) -> u8 {
        let clamped = clamp_priority(priority);
        self.priority.store(clamped, Ordering::SeqCst);
        clamped
    }

    /// Whether the client's tab is visible.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Set visibility; returns the previous value.
    pub fn set_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::SeqCst)
    }

    /// Cursor of the last successful delivery.
    pub fn last_fetch(&self) -> DateTime<Utc> {
        *self.last_fetch.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Advance the cursor to `time`; earlier times are ignored.
    /// Returns the cursor after the call.
    pub fn advance_cursor(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let mut cursor = self.last_fetch.write().unwrap_or_else(|e| e.into_inner());
        if time > *cursor {
            *cursor = time;
        }
        *cursor
    }

    /// Drop the items this connection was already sent.
    ///
    /// Ids created at or before `floor` are forgotten: a fetch starting
    /// at `floor` cannot return them again.
    pub fn unseen(&self, items: Vec<Notification>, floor: DateTime<Utc>) -> Vec<Notification> {
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.retain(|_, created_at| *created_at > floor);
        items
            .into_iter()
            .filter(|n| !recent.contains_key(&n.id))
            .collect()
    }

    /// Remember items that reached the outbox.
    pub fn mark_seen(&self, items: &[Notification]) {
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.extend(items.iter().map(|n| (n.id, n.created_at)));
    }

    /// Lock serializing deliveries to this connection.
    pub fn delivery_lock(&self) -> &Mutex<()> {
        &self.delivery_lock
    }

    /// Serializable view for diagnostics.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            user_id: self.user_id,
            role: self.role,
            priority: self.priority(),
            active: self.is_active(),
            last_fetch: self.last_fetch(),
            connected_at: self.connected_at,
        }
    }
}

/// Snapshot of a connection record (serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Connection ID
    pub id: ConnectionId,
    /// User ID
    pub user_id: UserId,
    /// Role
    pub role: Option<UserRole>,
    /// Priority
    pub priority: u8,
    /// Tab visible
    pub active: bool,
    /// Cursor
    pub last_fetch: DateTime<Utc>,
    /// Registered at
    pub connected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;

    use crate::metrics::EngineMetrics;

    fn record() -> (ConnectionRecord, tokio::sync::mpsc::Receiver<OutboundMessage>) {
        let id = ConnectionId::new();
        let (outbox, rx) = Outbox::channel(id, 8, Arc::new(EngineMetrics::new()));
        (
            ConnectionRecord::new(id, UserId::new(), None, outbox, Utc::now()),
            rx,
        )
    }

    #[test]
    fn test_defaults() {
        let (r, _rx) = record();
        assert_eq!(r.priority(), 5);
        assert!(r.is_active());
        assert_eq!(r.last_fetch(), r.connected_at);
    }

    #[test]
    fn test_priority_is_clamped() {
        let (r, _rx) = record();
        assert_eq!(r.set_priority(0), 1);
        assert_eq!(r.set_priority(42), 10);
        assert_eq!(r.set_priority(-7), 1);
        assert_eq!(r.set_priority(8), 8);
        assert_eq!(r.priority(), 8);
    }

    #[test]
    fn test_unseen_filters_pushed_ids_inside_window() {
        use notifyhub_entity::{NewNotification, NotificationType};

        let (r, _rx) = record();
        let now = Utc::now();
        let item = |age| {
            NewNotification::new(r.user_id, "t", "m", NotificationType::GeneralInfo)
                .into_notification(now - Duration::seconds(age))
        };
        let pushed = item(1);
        let fresh = item(1);
        r.mark_seen(std::slice::from_ref(&pushed));

        let left = r.unseen(vec![pushed.clone(), fresh.clone()], now - Duration::seconds(2));
        assert_eq!(left, vec![fresh]);

        // Once the window passes the item it is forgotten.
        assert_eq!(r.unseen(vec![pushed.clone()], now), vec![pushed]);
    }

    #[test]
    fn test_cursor_never_moves_back() {
        let (r, _rx) = record();
        let start = r.last_fetch();
        assert_eq!(r.advance_cursor(start - Duration::seconds(30)), start);
        let later = start + Duration::seconds(5);
        assert_eq!(r.advance_cursor(later), later);
        assert_eq!(r.last_fetch(), later);
    }
}
