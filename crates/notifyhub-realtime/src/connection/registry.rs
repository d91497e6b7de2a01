//! Client registry: every registered connection indexed by id and by user.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use notifyhub_core::types::{ConnectionId, UserId};
use notifyhub_entity::UserRole;

use super::outbox::Outbox;
use super::record::ConnectionRecord;

/// Capacity of the schedule-change feed.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// Result of registering a connection.
#[derive(Debug)]
pub struct Registration {
    /// The new record.
    pub record: Arc<ConnectionRecord>,
    /// Older connections of the same user closed to honor the per-user cap.
    pub evicted: Vec<Arc<ConnectionRecord>>,
}

/// Thread-safe map of live connections.
///
/// Operations on an unknown connection id are no-ops: a sweep may race
/// with a disconnect.
#[derive(Debug)]
pub struct ClientRegistry {
    /// Connection ID → record for direct lookup.
    by_id: DashMap<ConnectionId, Arc<ConnectionRecord>>,
    /// User ID → that user's records, oldest first.
    by_user: DashMap<UserId, Vec<Arc<ConnectionRecord>>>,
    /// Maximum connections per user (0 = unlimited).
    max_per_user: usize,
    /// Ids whose scheduling inputs changed.
    changes: broadcast::Sender<ConnectionId>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new(max_per_user: usize) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            by_id: DashMap::new(),
            by_user: DashMap::new(),
            max_per_user,
            changes,
        }
    }

    /// Registers a connection with the cursor at the current time.
    pub fn register(
        &self,
        id: ConnectionId,
        user_id: UserId,
        role: Option<UserRole>,
        outbox: Outbox,
    ) -> Registration {
        self.register_at(id, user_id, role, outbox, Utc::now())
    }

    /// Registers a connection with the cursor at `now`.
    pub fn register_at(
        &self,
        id: ConnectionId,
        user_id: UserId,
        role: Option<UserRole>,
        outbox: Outbox,
        now: DateTime<Utc>,
    ) -> Registration {
        let record = Arc::new(ConnectionRecord::new(id, user_id, role, outbox, now));

        let mut evicted = Vec::new();
        {
            let mut connections = self.by_user.entry(user_id).or_default();
            if self.max_per_user > 0 {
                while connections.len() >= self.max_per_user {
                    let oldest = connections.remove(0);
                    warn!(
                        conn_id = %oldest.id,
                        user_id = %user_id,
                        max = self.max_per_user,
                        "User at max connections, closing oldest"
                    );
                    evicted.push(oldest);
                }
            }
            connections.push(record.clone());
        }

        for old in &evicted {
            self.by_id.remove(&old.id);
            old.close();
            self.notify_change(old.id);
        }

        self.by_id.insert(id, record.clone());
        self.notify_change(id);
        debug!(conn_id = %id, user_id = %user_id, "Connection registered");

        Registration { record, evicted }
    }

    /// Sets a connection's priority (clamped into 1..=10).
    pub fn set_priority(&self, id: &ConnectionId, priority: i64) -> Option<u8> {
        let record = self.get(id)?;
        let before = record.priority();
        let after = record.set_priority(priority);
        if before != after {
            self.notify_change(*id);
        }
        Some(after)
    }

    /// Sets a connection's visibility.
    pub fn set_active(&self, id: &ConnectionId, active: bool) -> Option<bool> {
        let record = self.get(id)?;
        if record.set_active(active) != active {
            self.notify_change(*id);
        }
        Some(active)
    }

    /// Advances a connection's cursor; earlier times are ignored.
    pub fn touch(&self, id: &ConnectionId, time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.get(id).map(|record| record.advance_cursor(time))
    }

    /// Removes a connection.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ConnectionRecord>> {
        let (_, record) = self.by_id.remove(id)?;
        if let Some(mut connections) = self.by_user.get_mut(&record.user_id) {
            connections.retain(|c| c.id != *id);
            if connections.is_empty() {
                drop(connections);
                self.by_user.remove_if(&record.user_id, |_, v| v.is_empty());
            }
        }
        self.notify_change(*id);
        Some(record)
    }

    /// Gets a specific connection by ID.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<ConnectionRecord>> {
        self.by_id.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every connection whose tab is visible.
    pub fn list_active(&self) -> Vec<Arc<ConnectionRecord>> {
        self.by_id
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Snapshot of every connection.
    pub fn list_all(&self) -> Vec<Arc<ConnectionRecord>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Gets all connections for a user, oldest first.
    pub fn user_connections(&self, user_id: &UserId) -> Vec<Arc<ConnectionRecord>> {
        self.by_user
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Closes and removes every connection.
    pub fn close_all(&self) -> usize {
        let all = self.list_all();
        for record in &all {
            record.close();
            self.remove(&record.id);
        }
        all.len()
    }

    /// Total number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Number of visible connections.
    pub fn active_count(&self) -> usize {
        self.by_id
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
    }

    /// Number of unique connected users.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Subscribe to ids whose priority, visibility, or membership changed.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ConnectionId> {
        self.changes.subscribe()
    }

    fn notify_change(&self, id: ConnectionId) {
        // No subscriber outside the deadline scheduler.
        let _ = self.changes.send(id);
    }
}
