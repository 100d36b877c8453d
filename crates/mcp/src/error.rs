//! MCP error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn server: {0}")]
    Spawn(std::io::Error),

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("client not initialized")]
    NotInitialized,

    #[error("invalid lifecycle transition: {0}")]
    InvalidState(String),

    #[error("timeout waiting for response")]
    Timeout,

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] JsonRpcError),

    #[error("line too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },

    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(std::str::Utf8Error),
}

impl Error {
    /// Protocol error code, if the peer answered with an error response.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Rpc(err) => Some(err.code),
            _ => None,
        }
    }

    /// Whether the error concerns a single received line, leaving the stream
    /// positioned at the next one.
    pub fn is_line_error(&self) -> bool {
        matches!(self, Self::OutputTooLarge { .. } | Self::InvalidUtf8(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
