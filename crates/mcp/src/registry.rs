//! Tool registry: named tool definitions, input validation and execution.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{Instrument, Span, debug, info, warn};

use crate::protocol::{JsonRpcError, ToolDescriptor, error_codes};
use crate::schema::{InputSchema, Violation};

/// Error type a tool returns from [`Tool::invoke`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A callable operation exposed to the model.
///
/// Each tool carries its own name, description and input schema. The
/// registry validates arguments against the schema before `invoke` sees
/// them, so `invoke` receives arguments with defaults already applied.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> &InputSchema;

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, BoxError>;
}

/// Errors reported by the registry.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool already registered: {0}")]
    DuplicateName(String),

    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid input for {tool}: {}", join_violations(.violations))]
    Validation {
        tool: String,
        violations: Vec<Violation>,
    },

    #[error("tool {tool} failed: {source}")]
    Execution {
        tool: String,
        #[source]
        source: BoxError,
    },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<&ToolError> for JsonRpcError {
    fn from(err: &ToolError) -> Self {
        match err {
            ToolError::NotFound(tool) => {
                JsonRpcError::new(error_codes::TOOL_NOT_FOUND, err.to_string())
                    .with_data(json!({ "tool": tool }))
            }
            ToolError::Validation { tool, violations } => {
                JsonRpcError::new(error_codes::INVALID_TOOL_INPUT, err.to_string())
                    .with_data(json!({ "tool": tool, "violations": violations }))
            }
            ToolError::Execution { tool, source } => {
                JsonRpcError::new(error_codes::TOOL_EXECUTION_ERROR, err.to_string())
                    .with_data(json!({ "tool": tool, "cause": source.to_string() }))
            }
            ToolError::DuplicateName(tool) => JsonRpcError::internal(err)
                .with_data(json!({ "tool": tool })),
        }
    }
}

/// Holds the tools a server exposes.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    span: Span,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            span: tracing::info_span!("tool_registry"),
        }
    }

    /// Use `span` as the logging context for registry events.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Register a tool. Fails on a name collision unless `replace` is set.
    pub async fn register(
        &self,
        tool: impl Tool + 'static,
        replace: bool,
    ) -> Result<(), ToolError> {
        self.register_arc(Arc::new(tool), replace).await
    }

    pub async fn register_arc(&self, tool: Arc<dyn Tool>, replace: bool) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().await;
        if tools.contains_key(&name) && !replace {
            return Err(ToolError::DuplicateName(name));
        }
        let replaced = tools.insert(name.clone(), tool).is_some();
        self.span.in_scope(|| info!(tool = %name, replaced, "registered tool"));
        Ok(())
    }

    pub async fn unregister(&self, name: &str) -> Result<(), ToolError> {
        self.tools
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Descriptors for all registered tools, in no particular order.
    pub async fn list(&self) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .await
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema().to_value(),
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    /// Validate `arguments` and run the named tool.
    ///
    /// Errors and panics inside the tool come back as [`ToolError::Execution`].
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let arguments = tool
            .input_schema()
            .validate(&arguments)
            .map_err(|violations| ToolError::Validation {
                tool: name.to_string(),
                violations,
            })?;

        let span = tracing::info_span!(parent: &self.span, "invoke", tool = %name);
        let outcome = AssertUnwindSafe(tool.invoke(arguments))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        match outcome {
            Ok(Ok(value)) => {
                span.in_scope(|| debug!("tool completed"));
                Ok(value)
            }
            Ok(Err(source)) => {
                span.in_scope(|| warn!(error = %source, "tool failed"));
                Err(ToolError::Execution {
                    tool: name.to_string(),
                    source,
                })
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tool panicked".to_string());
                span.in_scope(|| warn!(error = %message, "tool panicked"));
                Err(ToolError::Execution {
                    tool: name.to_string(),
                    source: message.into(),
                })
            }
        }
    }
}
