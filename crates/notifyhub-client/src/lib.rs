//! # notifyhub-client
//!
//! Client agent for the NotifyHub hub. Keeps one logical connection
//! alive with capped exponential backoff, mirrors the most recent
//! notifications in a local cache, reports tab visibility as a
//! scheduling priority, and surfaces everything as a typed event stream.

pub mod agent;
pub mod alert;
pub mod backoff;
pub mod cache;
pub mod config;
pub mod event;
pub mod visibility;

pub use agent::ClientAgent;
pub use alert::{DesktopAlerter, TracingAlerter};
pub use backoff::ReconnectBackoff;
pub use cache::NotificationCache;
pub use config::ClientConfig;
pub use event::ClientEvent;
pub use visibility::VisibilitySignal;
