//! Notification creation and fan-out.

pub mod broadcaster;
pub mod service;

pub use broadcaster::{NoopBroadcaster, NotificationBroadcaster};
pub use service::NotificationService;
