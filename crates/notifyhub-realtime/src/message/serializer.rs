//! JSON serialization for WebSocket messages.

use notifyhub_core::error::AppError;

use super::types::{InboundMessage, OutboundMessage};

/// Serialize an outbound message to a JSON text frame.
pub fn serialize_outbound(msg: &OutboundMessage) -> Result<String, AppError> {
    Ok(serde_json::to_string(msg)?)
}

/// Deserialize an inbound message from a JSON text frame.
pub fn deserialize_inbound(text: &str) -> Result<InboundMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Serialize an inbound message; used by clients.
pub fn serialize_inbound(msg: &InboundMessage) -> Result<String, AppError> {
    Ok(serde_json::to_string(msg)?)
}

/// Deserialize an outbound message; used by clients.
pub fn deserialize_outbound(text: &str) -> Result<OutboundMessage, serde_json::Error> {
    serde_json::from_str(text)
}
