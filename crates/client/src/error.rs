//! Client-side error taxonomy

use agentline_protocol::ProtocolError;
use thiserror::Error;

/// Errors surfaced to callers of the client runtime
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection is not open; the caller must wait for a reconnect
    /// or call `connect()` again. Nothing was transmitted.
    #[error("connection is not open")]
    NotConnected,

    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),
}
