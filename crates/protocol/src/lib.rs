//! Agentline Protocol
//!
//! Wire types for the agent chat stream. Inbound frames are a tagged-union
//! JSON object with a `type` field; the outbound envelope is a plain
//! `{"message": <string>}` object. Everything is serialized as JSON text
//! over the WebSocket.

use thiserror::Error;
use uuid::Uuid;

pub mod inbound;
pub mod outbound;

pub use inbound::{AgentFrame, ToolOutput};
pub use outbound::UserText;

/// Errors raised by the frame codec
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Decode one inbound payload into a typed frame.
///
/// Each payload is parsed independently; a payload that fails to parse is
/// an error for the caller to report and drop — decoding never panics.
pub fn decode_frame(payload: &str) -> Result<AgentFrame, ProtocolError> {
    serde_json::from_str(payload).map_err(ProtocolError::MalformedFrame)
}

/// Encode user text into the outbound envelope.
pub fn encode_user_text(text: &str) -> Result<String, ProtocolError> {
    serde_json::to_string(&UserText {
        message: text.to_string(),
    })
    .map_err(ProtocolError::Encode)
}

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
