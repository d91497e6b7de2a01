//! # notifyhub-entity
//!
//! Domain entity models for NotifyHub. Database entities derive
//! `sqlx::FromRow`; everything that crosses the wire serializes in
//! camelCase.

pub mod notification;
pub mod user;

pub use notification::{NewNotification, Notification, NotificationType};
pub use user::UserRole;
