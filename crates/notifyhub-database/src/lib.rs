//! # notifyhub-database
//!
//! Notification store adapters. The hub only talks to the
//! [`NotificationStore`] trait; this crate provides a PostgreSQL
//! implementation and a process-local one used for development and tests.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryNotificationStore;
pub use repositories::notification::PgNotificationStore;
pub use store::NotificationStore;
