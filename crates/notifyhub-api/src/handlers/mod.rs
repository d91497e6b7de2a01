//! Route handlers.

pub mod health;
pub mod notification;
pub mod stats;
pub mod ws;
