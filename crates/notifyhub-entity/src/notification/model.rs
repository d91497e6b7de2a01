//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use notifyhub_core::types::{NotificationId, UserId};

use super::kind::NotificationType;

/// A persisted notification addressed to one user.
///
/// Immutable except for `is_read`, which only ever moves from `false`
/// to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// The recipient user.
    pub user_id: UserId,
    /// Short display title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Workflow category.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: NotificationType,
    /// Whether the user has read this notification.
    pub is_read: bool,
    /// Opaque reference to the entity that caused it (rental, calibration, ...).
    pub related_id: Option<String>,
    /// Creation time; ordering key for "new since" queries.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Whether this notification warrants an escalated alert.
    pub fn is_priority(&self) -> bool {
        self.kind.is_priority()
    }
}

/// Input for creating a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    /// The recipient user.
    pub user_id: UserId,
    /// Short display title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Workflow category.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Opaque reference to the originating entity.
    pub related_id: Option<String>,
}

impl NewNotification {
    /// Create a new notification input without a related entity.
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationType,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            kind,
            related_id: None,
        }
    }

    /// Attach the originating entity reference.
    pub fn related_to(mut self, related_id: impl Into<String>) -> Self {
        self.related_id = Some(related_id.into());
        self
    }

    /// Materialize into a stored notification.
    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: NotificationId::new(),
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            is_read: false,
            related_id: self.related_id,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_camel_case() {
        let n = NewNotification::new(
            UserId::new(),
            "Calibration due",
            "Scope #4 is due Friday",
            NotificationType::CalibrationReminder,
        )
        .related_to("cal-42")
        .into_notification(Utc::now());

        let json = serde_json::to_value(&n).expect("serialize");
        assert_eq!(json["type"], "calibration_reminder");
        assert_eq!(json["isRead"], false);
        assert_eq!(json["relatedId"], "cal-42");
        assert!(json.get("userId").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
