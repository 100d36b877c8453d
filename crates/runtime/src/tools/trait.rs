//! Tool host trait.

use crate::model::ToolSpec;
use crate::tools::{ToolCall, ToolError};
use serde_json::Value;
use std::future::Future;

/// Trait for tool execution hosts.
///
/// This is the boundary between the session loop and side effects.
pub trait ToolHost: Send + Sync {
    /// The manifest offered to the model.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<Value, ToolError>> + Send;
}
