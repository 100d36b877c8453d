//! MCP server: lifecycle, receive loop and method dispatch.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::channel::{Channel, MAX_LINE_SIZE};
use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, Implementation, Incoming, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, Method,
    PING_ACK, PROTOCOL_VERSION, ServerCapabilities, ShutdownResult, ToolsCapability, error_codes,
};
use crate::registry::ToolRegistry;

/// Server lifecycle.
///
/// `Listening` becomes `Ready` only after an `initialize` request *and* a
/// subsequent `initialized` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Listening,
    Ready,
    Stopped,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Listening => "listening",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// A tool server speaking the protocol over a [`Channel`].
pub struct Server {
    info: Implementation,
    registry: ToolRegistry,
    state: Lifecycle,
    initialize_seen: bool,
    stop_requested: bool,
    channel: Option<Channel>,
    span: Span,
}

impl Server {
    pub fn new(info: Implementation, registry: ToolRegistry) -> Self {
        let span = tracing::info_span!("server", name = %info.name);
        Self {
            info,
            registry,
            state: Lifecycle::Created,
            initialize_seen: false,
            stop_requested: false,
            channel: None,
            span,
        }
    }

    /// Use `span` as the logging context for server events.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Take ownership of the channel and start listening.
    pub fn start(&mut self, channel: Channel) -> Result<()> {
        if self.state != Lifecycle::Created {
            return Err(Error::InvalidState(format!(
                "cannot start a server that is {}",
                self.state
            )));
        }
        self.channel = Some(channel);
        self.state = Lifecycle::Listening;
        self.span.in_scope(|| info!("listening"));
        Ok(())
    }

    /// Start on `channel` and serve until shutdown or end of stream.
    pub async fn run(mut self, channel: Channel) -> Result<()> {
        self.start(channel)?;
        self.serve().await
    }

    /// Process messages one at a time until shutdown, EOF, or a channel error.
    pub async fn serve(&mut self) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            return Err(Error::InvalidState(format!(
                "cannot serve a server that is {}",
                self.state
            )));
        };

        let span = self.span.clone();
        let result = self.receive_loop(&mut channel).instrument(span.clone()).await;

        if let Err(e) = channel.close().await {
            span.in_scope(|| debug!(error = %e, "closing channel failed"));
        }
        self.state = Lifecycle::Stopped;
        span.in_scope(|| info!("stopped"));
        result
    }

    async fn receive_loop(&mut self, channel: &mut Channel) -> Result<()> {
        loop {
            let response = match channel.receive().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => self.handle_line(&line).await,
                Ok(None) => {
                    info!("channel closed by peer");
                    return Ok(());
                }
                Err(e) if e.is_line_error() => {
                    warn!(error = %e, "rejecting unreadable line");
                    Some(JsonRpcResponse::failure(None, JsonRpcError::parse_error(e)))
                }
                Err(e) => {
                    error!(error = %e, "channel read failed");
                    return Err(e);
                }
            };

            if let Some(response) = response {
                channel.send(&encode_response(response)?).await?;
            }

            if self.stop_requested {
                info!("shutdown requested");
                return Ok(());
            }
        }
    }

    /// Handle one raw line. Returns the response to write, if any.
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        match Incoming::parse(line) {
            Ok(Incoming::Request(request)) => Some(self.handle_request(request).await),
            Ok(Incoming::Notification(notification)) => {
                self.handle_notification(notification);
                None
            }
            Err(err) if err.is_notification() => {
                warn!(error = ?err, "dropping malformed notification");
                None
            }
            Err(err) => {
                warn!(error = ?err, "rejecting malformed message");
                Some(err.into_response())
            }
        }
    }

    async fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(id = %request.id, method = %request.method, "request");
        match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(err) => {
                debug!(id = %request.id, error = %err, "request failed");
                JsonRpcResponse::failure(Some(request.id), err)
            }
        }
    }

    fn handle_notification(&mut self, notification: JsonRpcNotification) {
        match Method::parse(&notification.method) {
            Some(Method::Initialized) => {
                if self.state == Lifecycle::Listening && self.initialize_seen {
                    self.state = Lifecycle::Ready;
                    info!("handshake complete");
                } else {
                    warn!(state = %self.state, "ignoring unexpected initialized notification");
                }
            }
            _ => debug!(method = %notification.method, "ignoring notification"),
        }
    }

    async fn dispatch(
        &mut self,
        name: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        let Some(method) = Method::parse(name) else {
            return Err(JsonRpcError::method_not_found(name));
        };

        if method.is_notification() {
            return Err(JsonRpcError::invalid_request(format!(
                "{method} is a notification and takes no id"
            )));
        }

        if self.state != Lifecycle::Ready && !method.allowed_before_ready() {
            return Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("method not allowed before initialization: {method}"),
            )
            .with_data(json!({ "method": name, "state": self.state.to_string() })));
        }

        match method {
            Method::Initialize => self.initialize(params),
            Method::Ping => Ok(json!(PING_ACK)),
            Method::ToolsList => to_result(&ListToolsResult {
                tools: self.registry.list().await,
            }),
            Method::ToolsCall => self.call_tool(params).await,
            Method::Shutdown => {
                self.stop_requested = true;
                to_result(&ShutdownResult { success: true })
            }
            Method::Initialized => Err(JsonRpcError::method_not_found(name)),
        }
    }

    fn initialize(&mut self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        match params.map(serde_json::from_value::<InitializeParams>) {
            Some(Ok(params)) => info!(
                client = %params.client.name,
                client_version = %params.client.version,
                protocol_version = %params.protocol_version,
                "initialize"
            ),
            Some(Err(e)) => debug!(error = %e, "initialize without recognizable client info"),
            None => debug!("initialize without params"),
        }

        self.initialize_seen = true;
        to_result(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server: self.info.clone(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(JsonRpcError::invalid_params)?;

        info!(tool = %params.name, "tools/call");
        let arguments = params.arguments.unwrap_or_default();
        match self.registry.invoke(&params.name, arguments).await {
            Ok(output) => to_result(&CallToolResult::new(output)),
            Err(e) => Err(JsonRpcError::from(&e)),
        }
    }
}

/// Serialize `response`, replacing it with an error addressed to the same id
/// when the line would exceed [`MAX_LINE_SIZE`].
fn encode_response(response: JsonRpcResponse) -> Result<String> {
    let line = serde_json::to_string(&response)?;
    if line.len() <= MAX_LINE_SIZE {
        return Ok(line);
    }

    warn!(id = ?response.id, size = line.len(), "response too large, sending error instead");
    let error = JsonRpcError::internal(format!(
        "response of {} bytes exceeds the {MAX_LINE_SIZE} byte line limit",
        line.len()
    ));
    Ok(serde_json::to_string(&JsonRpcResponse::failure(response.id, error))?)
}

fn to_result(value: &impl Serialize) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(JsonRpcError::internal)
}
