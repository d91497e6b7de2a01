//! PostgreSQL repository implementations.

pub mod notification;
