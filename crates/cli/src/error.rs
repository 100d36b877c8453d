//! CLI error types.

use crate::config::ConfigError;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The log subscriber could not be installed.
    #[error("failed to set up logging: {0}")]
    Logging(String),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An error occurred talking to or serving the tool protocol.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    /// A demo tool could not be registered.
    #[error(transparent)]
    Tool(#[from] mcp::ToolError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
