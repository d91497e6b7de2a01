//! Push side of notification creation.

use async_trait::async_trait;

use notifyhub_core::types::UserId;

/// Something that can push fresh state to a user's live connections.
#[async_trait]
pub trait NotificationBroadcaster: Send + Sync + std::fmt::Debug + 'static {
    /// Push pending notifications and the unread count to every
    /// connection of `user_id`. Users with no connections are ignored.
    async fn broadcast_to_user(&self, user_id: UserId);
}

/// Broadcaster that does nothing.
///
/// Used by out-of-process writers such as the CLI; the hub's base sweep
/// picks their notifications up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

#[async_trait]
impl NotificationBroadcaster for NoopBroadcaster {
    async fn broadcast_to_user(&self, _user_id: UserId) {}
}
