//! The notification store contract consumed by the hub and the service layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notifyhub_core::result::AppResult;
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::{NewNotification, Notification, UserRole};

/// Read/write access to persisted notifications.
///
/// The store is the source of truth for read state and unread counts;
/// everything the hub keeps in memory is derived from it.
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Notifications for `user_id` created strictly after `since`, oldest first.
    async fn fetch_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>>;

    /// The `limit` most recent notifications for `user_id`, newest first.
    async fn list_recent(&self, user_id: UserId, limit: u32) -> AppResult<Vec<Notification>>;

    /// Number of unread notifications for `user_id`.
    async fn count_unread(&self, user_id: UserId) -> AppResult<i64>;

    /// Mark one notification read. Marking an already-read or foreign
    /// notification is a no-op.
    async fn mark_read(&self, notification_id: NotificationId, user_id: UserId) -> AppResult<()>;

    /// Mark every notification of `user_id` read; returns how many changed.
    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64>;

    /// Persist a new notification.
    async fn create(&self, input: NewNotification) -> AppResult<Notification>;

    /// Active users holding `role`.
    async fn user_ids_by_role(&self, role: UserRole) -> AppResult<Vec<UserId>>;

    /// Check store connectivity.
    async fn health_check(&self) -> AppResult<bool>;
}
