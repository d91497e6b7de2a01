//! Process-local notification store.
//!
//! Used when `database.provider = "memory"` and by tests. Supports
//! explicit creation timestamps and failure injection so cursor and
//! error-path behavior can be exercised deterministically.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use notifyhub_core::error::AppError;
use notifyhub_core::result::AppResult;
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::{NewNotification, Notification, UserRole};

use crate::store::NotificationStore;

/// In-memory [`NotificationStore`].
#[derive(Debug, Default)]
pub struct MemoryNotificationStore {
    notifications: DashMap<NotificationId, Notification>,
    users: DashMap<UserId, UserRole>,
    unavailable: AtomicBool,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user so role fan-out can find it.
    pub fn add_user(&self, user_id: UserId, role: UserRole) {
        self.users.insert(user_id, role);
    }

    /// Insert a fully-formed notification, keeping its `created_at`.
    pub fn insert(&self, notification: Notification) -> Notification {
        self.notifications
            .insert(notification.id, notification.clone());
        notification
    }

    /// Make every subsequent call fail with a database error (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total number of stored notifications.
    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    /// Whether the store holds no notifications.
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::database("Notification store unavailable"));
        }
        Ok(())
    }

    fn for_user(&self, user_id: UserId) -> Vec<Notification> {
        self.notifications
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn fetch_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        self.check_available()?;
        let mut found: Vec<_> = self
            .for_user(user_id)
            .into_iter()
            .filter(|n| n.created_at > since)
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn list_recent(&self, user_id: UserId, limit: u32) -> AppResult<Vec<Notification>> {
        self.check_available()?;
        let mut found = self.for_user(user_id);
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn count_unread(&self, user_id: UserId) -> AppResult<i64> {
        self.check_available()?;
        let count = self
            .notifications
            .iter()
            .filter(|entry| entry.user_id == user_id && !entry.is_read)
            .count();
        Ok(count as i64)
    }

    async fn mark_read(&self, notification_id: NotificationId, user_id: UserId) -> AppResult<()> {
        self.check_available()?;
        if let Some(mut entry) = self.notifications.get_mut(&notification_id) {
            if entry.user_id == user_id {
                entry.is_read = true;
            }
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64> {
        self.check_available()?;
        let mut changed = 0;
        for mut entry in self.notifications.iter_mut() {
            if entry.user_id == user_id && !entry.is_read {
                entry.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn create(&self, input: NewNotification) -> AppResult<Notification> {
        self.check_available()?;
        let notification = input.into_notification(Utc::now());
        debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = %notification.kind,
            "Stored notification"
        );
        Ok(self.insert(notification))
    }

    async fn user_ids_by_role(&self, role: UserRole) -> AppResult<Vec<UserId>> {
        self.check_available()?;
        let mut ids: Vec<_> = self
            .users
            .iter()
            .filter(|entry| *entry.value() == role)
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }
}
