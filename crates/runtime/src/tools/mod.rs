//! Tool execution seam and tool-call payload handling.

pub mod errors;
mod mcp_host;
mod r#trait;
mod types;

pub use errors::ToolError;
pub use mcp_host::McpToolHost;
pub use r#trait::ToolHost;
pub use types::{ToolCall, ToolOutcome, format_outcomes, parse_tool_calls};
