//! Notification creation for one user, a set of users, or a role.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use notifyhub_core::error::AppError;
use notifyhub_core::types::UserId;
use notifyhub_database::NotificationStore;
use notifyhub_entity::{NewNotification, Notification, NotificationType, UserRole};

use super::broadcaster::NotificationBroadcaster;

/// Persists notifications and pushes them to connected users.
#[derive(Debug, Clone)]
pub struct NotificationService {
    /// Notification store.
    store: Arc<dyn NotificationStore>,
    /// Push side, normally the real-time engine.
    broadcaster: Arc<dyn NotificationBroadcaster>,
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        broadcaster: Arc<dyn NotificationBroadcaster>,
    ) -> Self {
        Self { store, broadcaster }
    }

    /// Creates a notification for a single user and pushes it.
    pub async fn create_notification(
        &self,
        input: NewNotification,
    ) -> Result<Notification, AppError> {
        if input.title.trim().is_empty() {
            return Err(AppError::validation("Notification title must not be empty"));
        }

        let notification = self.store.create(input).await?;
        info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = %notification.kind,
            "Notification created"
        );

        self.broadcaster
            .broadcast_to_user(notification.user_id)
            .await;
        Ok(notification)
    }

    /// Creates the same notification for each user in `user_ids`.
    ///
    /// Duplicate ids are collapsed. A failure for one user is logged and
    /// does not stop the others; the error is returned only if every
    /// creation failed.
    pub async fn notify_users(
        &self,
        user_ids: &[UserId],
        title: &str,
        message: &str,
        kind: NotificationType,
        related_id: Option<&str>,
    ) -> Result<Vec<Notification>, AppError> {
        let mut seen = HashSet::new();
        let mut created = Vec::with_capacity(user_ids.len());
        let mut last_error = None;

        for user_id in user_ids.iter().copied().filter(|id| seen.insert(*id)) {
            let mut input = NewNotification::new(user_id, title, message, kind);
            if let Some(related) = related_id {
                input = input.related_to(related);
            }

            match self.create_notification(input).await {
                Ok(notification) => created.push(notification),
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Failed to notify user");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if created.is_empty() => Err(e),
            _ => Ok(created),
        }
    }

    /// Creates the notification for every active user holding `role`.
    pub async fn notify_role(
        &self,
        role: UserRole,
        title: &str,
        message: &str,
        kind: NotificationType,
        related_id: Option<&str>,
    ) -> Result<Vec<Notification>, AppError> {
        let user_ids = self.store.user_ids_by_role(role).await?;
        info!(role = %role, recipients = user_ids.len(), "Notifying role");
        self.notify_users(&user_ids, title, message, kind, related_id)
            .await
    }
}
