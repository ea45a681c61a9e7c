//! Error types for the media-server client.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{RpcError, codes};

/// Result type for all client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the control connection and the typed endpoint wrappers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The WebSocket connection failed or was torn down underneath us.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// The control connection is closed; no further requests are possible.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No response arrived within the request timeout.
    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The server answered with a JSON-RPC error.
    #[error("Server error {code}: {message}")]
    Server { code: i64, message: String },

    /// The server no longer knows the object, typically because it or its
    /// pipeline was released.
    #[error("Object not found: {message}")]
    ObjectNotFound { message: String },

    /// The peer sent something that is not valid protocol traffic.
    #[error("Protocol violation: {message}")]
    Protocol { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Creates a transport error from any displayable cause.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    /// Creates a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol { message: message.into() }
    }

    /// Maps a wire-level error object onto the client error type, giving the
    /// object-not-found code its own variant so callers can match on it.
    pub fn from_rpc(error: RpcError) -> Self {
        if error.code == codes::OBJECT_NOT_FOUND {
            Self::ObjectNotFound { message: error.message }
        } else {
            Self::Server { code: error.code, message: error.message }
        }
    }

    /// True when the error means the target object is gone.
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }
}
