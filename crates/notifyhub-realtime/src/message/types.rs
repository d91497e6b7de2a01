//! Inbound and outbound WebSocket message type definitions.

use serde::{Deserialize, Serialize};

use notifyhub_core::error::AppError;
use notifyhub_core::types::NotificationId;
use notifyhub_entity::Notification;

/// Error code for frames that could not be decoded.
pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";

/// Messages sent by the client to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InboundMessage {
    /// Bind this connection to a user.
    Register {
        /// User id; validated by the handler so a bad value is a protocol error.
        #[serde(default)]
        user_id: Option<String>,
        /// Optional role name.
        #[serde(default)]
        role: Option<String>,
    },
    /// The client's tab became visible or hidden.
    VisibilityChange {
        /// Whether the tab is in the foreground.
        is_visible: bool,
    },
    /// Client-reported scheduling weight; clamped into 1..=10.
    SetPriority {
        /// Requested priority.
        priority: i64,
    },
    /// Deliver pending notifications now.
    RefreshNotifications,
    /// Mark one notification read.
    MarkAsRead {
        /// Notification to mark.
        notification_id: NotificationId,
    },
    /// Mark all of the user's notifications read.
    MarkAllRead,
}

impl InboundMessage {
    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::VisibilityChange { .. } => "visibility_change",
            Self::SetPriority { .. } => "set_priority",
            Self::RefreshNotifications => "refresh_notifications",
            Self::MarkAsRead { .. } => "mark_as_read",
            Self::MarkAllRead => "mark_all_read",
        }
    }
}

/// Messages sent by the hub to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// Snapshot sent right after registration.
    InitialNotifications {
        /// Most recent notifications, newest first.
        notifications: Vec<Notification>,
        /// Current unread count.
        unread_count: i64,
    },
    /// Notifications created since the connection's cursor, oldest first.
    NewNotifications {
        /// The new notifications.
        notifications: Vec<Notification>,
    },
    /// Subset of a `new_notifications` batch that warrants an escalated alert.
    PriorityNotifications {
        /// The reminder notifications.
        notifications: Vec<Notification>,
    },
    /// Current unread count.
    UnreadCount {
        /// Unread notifications for the user.
        unread_count: i64,
    },
    /// A notification was marked read.
    NotificationMarkedRead {
        /// The notification.
        notification_id: NotificationId,
    },
    /// Every notification of the user was marked read.
    AllNotificationsMarkedRead,
    /// Error message.
    Error {
        /// Error code.
        code: String,
        /// Error description.
        message: String,
    },
}

impl OutboundMessage {
    /// Error message carrying the kind of `err` as its code.
    pub fn from_error(err: &AppError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.message.clone(),
        }
    }

    /// Error message for an undecodable frame.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::Error {
            code: INVALID_MESSAGE.to_string(),
            message: message.into(),
        }
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitialNotifications { .. } => "initial_notifications",
            Self::NewNotifications { .. } => "new_notifications",
            Self::PriorityNotifications { .. } => "priority_notifications",
            Self::UnreadCount { .. } => "unread_count",
            Self::NotificationMarkedRead { .. } => "notification_marked_read",
            Self::AllNotificationsMarkedRead => "all_notifications_marked_read",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_uses_camel_case_fields() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "type": "visibility_change",
            "isVisible": false
        }))
        .unwrap();
        assert_eq!(msg, InboundMessage::VisibilityChange { is_visible: false });

        let msg: InboundMessage =
            serde_json::from_value(json!({ "type": "refresh_notifications" })).unwrap();
        assert_eq!(msg, InboundMessage::RefreshNotifications);
    }

    #[test]
    fn test_register_without_user_id_still_decodes() {
        let msg: InboundMessage = serde_json::from_value(json!({ "type": "register" })).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Register {
                user_id: None,
                role: None
            }
        );
    }

    #[test]
    fn test_outbound_tags() {
        let json = serde_json::to_value(OutboundMessage::UnreadCount { unread_count: 3 }).unwrap();
        assert_eq!(json, json!({ "type": "unread_count", "unreadCount": 3 }));

        let json = serde_json::to_value(OutboundMessage::AllNotificationsMarkedRead).unwrap();
        assert_eq!(json, json!({ "type": "all_notifications_marked_read" }));
    }

    #[test]
    fn test_error_from_app_error() {
        let msg = OutboundMessage::from_error(&AppError::validation("userId is required"));
        assert_eq!(
            msg,
            OutboundMessage::Error {
                code: "VALIDATION".into(),
                message: "userId is required".into()
            }
        );
    }
}
