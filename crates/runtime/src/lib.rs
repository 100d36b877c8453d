//! Toolhost runtime: model backends and the tool-calling session loop.
//!
//! # Overview
//!
//! - **Session**: drives a conversation. Each user message becomes one final
//!   answer, with up to [`MAX_TOOL_ROUNDS`] rounds of tool calls in between.
//! - **Backend**: a model-completion provider (Anthropic, Ollama).
//! - **ToolHost**: where tool calls run. [`McpToolHost`] forwards them to an
//!   MCP server through [`mcp::Client`].
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ClientOptions, ServerConfig};
//! use runtime::{AnthropicBackend, McpToolHost, Session};
//! use std::collections::HashMap;
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = AnthropicBackend::builder("sk-ant-api01-...", "claude-sonnet-4-20250514").build();
//! let config = ServerConfig {
//!     name: "demo".to_string(),
//!     command: "toolhost".to_string(),
//!     args: vec!["serve".to_string()],
//!     env: HashMap::new(),
//! };
//! let host = McpToolHost::spawn(&config, ClientOptions::default()).await?;
//!
//! let mut session = Session::new(backend, host).with_system("You are helpful.");
//! let response = session.chat("Roll a d20").await?;
//! println!("{response}");
//! session.host().close().await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod model;
pub mod providers;
mod session;
pub mod tools;

pub use error::{Error, Result};
pub use model::{Backend, Message, ModelError, ModelRequest, ModelResponse, Role, ToolSpec, Usage};
pub use providers::{AnthropicBackend, OllamaBackend};
pub use session::{MAX_TOOL_ROUNDS, Session};
pub use tools::{McpToolHost, ToolCall, ToolError, ToolHost, ToolOutcome};
