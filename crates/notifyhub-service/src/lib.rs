//! # notifyhub-service
//!
//! Business-level notification operations. Services persist through a
//! [`notifyhub_database::NotificationStore`] and announce new
//! notifications through a [`NotificationBroadcaster`], which the
//! real-time hub implements.

pub mod notification;

pub use notification::{NoopBroadcaster, NotificationBroadcaster, NotificationService};
