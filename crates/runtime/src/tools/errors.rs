use mcp::{JsonRpcError, Violation, error_codes};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// These are folded into the conversation as text and never abort a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("timed out waiting for the tool server")]
    Timeout,
    #[error("tool server unavailable: {0}")]
    Connection(String),
}

impl From<mcp::Error> for ToolError {
    fn from(err: mcp::Error) -> Self {
        match &err {
            mcp::Error::Rpc(rpc) => match rpc.code {
                error_codes::TOOL_NOT_FOUND => Self::NotFound(detail(rpc, "tool")),
                error_codes::INVALID_TOOL_INPUT => Self::InvalidInput(violations(rpc)),
                error_codes::INVALID_PARAMS => Self::InvalidInput(rpc.message.clone()),
                _ => Self::Execution(detail(rpc, "cause")),
            },
            mcp::Error::Timeout => Self::Timeout,
            mcp::Error::ConnectionClosed | mcp::Error::Io(_) | mcp::Error::Spawn(_) => {
                Self::Connection(err.to_string())
            }
            _ => Self::Execution(err.to_string()),
        }
    }
}

/// The string at `data[key]`, or the whole message when the peer sent none.
fn detail(rpc: &JsonRpcError, key: &str) -> String {
    rpc.data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(Value::as_str)
        .map_or_else(|| rpc.message.clone(), str::to_string)
}

fn violations(rpc: &JsonRpcError) -> String {
    let parsed = rpc
        .data
        .as_ref()
        .and_then(|data| data.get("violations"))
        .and_then(|v| Vec::<Violation>::deserialize(v).ok())
        .filter(|v| !v.is_empty());

    match parsed {
        Some(violations) => violations
            .iter()
            .map(Violation::to_string)
            .collect::<Vec<_>>()
            .join("; "),
        None => rpc.message.clone(),
    }
}
