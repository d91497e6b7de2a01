//! # notifyhub-realtime
//!
//! Real-time notification hub. Provides:
//!
//! - The client registry of live connections (priority, visibility, cursor)
//! - The delivery primitive that pushes notifications-since-cursor
//! - The adaptive scheduler (deadline queue or dual fixed sweeps)
//! - The per-connection channel handler implementing the wire protocol
//! - In-process metrics

pub mod connection;
pub mod delivery;
pub mod message;
pub mod metrics;
pub mod scheduler;
pub mod server;

pub use connection::handler::{ChannelHandler, HandlerState};
pub use connection::registry::ClientRegistry;
pub use delivery::{DeliveryOutcome, Deliverer};
pub use message::types::{InboundMessage, OutboundMessage};
pub use metrics::EngineMetrics;
pub use scheduler::{Scheduler, SweepReport};
pub use server::{EngineStats, RealtimeEngine};
