//! PostgreSQL notification store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_entity::{NewNotification, Notification, UserRole};

use crate::store::NotificationStore;

/// Notification store backed by the `notifications` and `users` tables.
#[derive(Debug, Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    /// Create a new store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn fetch_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, title, message, type, is_read, related_id, created_at \
             FROM notifications WHERE user_id = $1 AND created_at > $2 \
             ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to fetch new notifications", e)
        })
    }

    async fn list_recent(&self, user_id: UserId, limit: u32) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, title, message, type, is_read, related_id, created_at \
             FROM notifications WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list notifications", e))
    }

    async fn count_unread(&self, user_id: UserId) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count unread", e))
    }

    async fn mark_read(&self, notification_id: NotificationId, user_id: UserId) -> AppResult<()> {
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark read", e))?;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark all read", e))?;
        Ok(result.rows_affected())
    }

    /// `created_at` comes from the hub clock, the same clock delivery
    /// cursors are taken from.
    async fn create(&self, input: NewNotification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (id, user_id, title, message, type, related_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, user_id, title, message, type, is_read, related_id, created_at",
        )
        .bind(NotificationId::new())
        .bind(input.user_id)
        .bind(&input.title)
        .bind(&input.message)
        .bind(input.kind)
        .bind(&input.related_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create notification", e)
        })
    }

    async fn user_ids_by_role(&self, role: UserRole) -> AppResult<Vec<UserId>> {
        sqlx::query_scalar::<_, UserId>(
            "SELECT id FROM users WHERE role = $1 AND is_active = TRUE ORDER BY created_at",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list users by role", e))
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }
}
