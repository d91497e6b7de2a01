//! Connection state: outbound queue, registry records, and the per-connection handler.

pub mod handler;
pub mod outbox;
pub mod record;
pub mod registry;

pub use handler::{ChannelHandler, HandlerState};
pub use outbox::Outbox;
pub use record::ConnectionRecord;
pub use registry::{ClientRegistry, Registration};
