//! Events the agent reports to its host.

use std::time::Duration;

use notifyhub_core::types::NotificationId;
use notifyhub_entity::Notification;

/// Something the host UI may want to react to.
///
/// Emitted in causal order: `Connected`, then `Snapshot`, then
/// incremental updates until `Disconnected`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The transport is up and `register` has been sent.
    Connected,
    /// The transport dropped.
    Disconnected {
        /// Close frame text or transport error.
        reason: String,
    },
    /// A reconnect is scheduled.
    Reconnecting {
        /// Consecutive failed attempts, starting at 1.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// Registration snapshot; replaces the cache.
    Snapshot {
        /// Most recent notifications, newest first.
        notifications: Vec<Notification>,
        /// Unread count at registration.
        unread_count: i64,
    },
    /// Notifications not seen before.
    NewNotifications(Vec<Notification>),
    /// Reminders that warrant an escalated alert.
    PriorityAlert(Vec<Notification>),
    /// Fresh unread count.
    UnreadCount(i64),
    /// One notification was marked read (possibly from another tab).
    MarkedRead(NotificationId),
    /// Everything was marked read.
    AllMarkedRead,
    /// A desktop alert was clicked; the host should take focus.
    FocusRequested {
        /// The clicked notification.
        notification_id: NotificationId,
    },
    /// The hub reported an error.
    ServerError {
        /// Error code (`VALIDATION`, `DATABASE`, `INVALID_MESSAGE`, ...).
        code: String,
        /// Error description.
        message: String,
    },
}
