//! MCP protocol types (JSON-RPC 2.0 based).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version exchanged during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Literal result of `ping`.
pub const PING_ACK: &str = "pong";

/// Standard error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const TOOL_NOT_FOUND: i32 = -32001;
    pub const TOOL_EXECUTION_ERROR: i32 = -32002;
    pub const INVALID_TOOL_INPUT: i32 = -32003;
}

/// Methods the protocol knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Initialized,
    Ping,
    ToolsList,
    ToolsCall,
    Shutdown,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "notifications/initialized" | "initialized" => Some(Self::Initialized),
            "ping" => Some(Self::Ping),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "shutdown" => Some(Self::Shutdown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "notifications/initialized",
            Self::Ping => "ping",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether the method is only ever sent without an id.
    pub fn is_notification(&self) -> bool {
        matches!(self, Self::Initialized)
    }

    /// Whether the server dispatches the method before the handshake completes.
    pub fn allowed_before_ready(&self) -> bool {
        matches!(self, Self::Initialize | Self::Ping)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }
}

/// JSON-RPC 2.0 notification (a request without an id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }
}

/// JSON-RPC 2.0 response.
///
/// `id` is `None` only for errors that could not be correlated with a request
/// (e.g. a line that failed to parse); it is serialized as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns the result if successful, or the error.
    ///
    /// A response carrying neither reads as `null` here; the client rejects
    /// such responses before they reach this point.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(error) = self.error {
            Err(error)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(error_codes::PARSE_ERROR, format!("parse error: {detail}"))
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(error_codes::INVALID_REQUEST, format!("invalid request: {detail}"))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(error_codes::METHOD_NOT_FOUND, format!("method not found: {method}"))
            .with_data(serde_json::json!({ "method": method }))
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(error_codes::INVALID_PARAMS, format!("invalid params: {detail}"))
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, format!("internal error: {detail}"))
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.code;
        let message = &self.message;
        write!(f, "[{code}] {message}")
    }
}

impl std::error::Error for JsonRpcError {}

/// Request ID (can be string or number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

// --- Incoming message classification ---

/// A message received by the server: either a call expecting a reply or a
/// notification that must never get one.
#[derive(Debug, Clone)]
pub enum Incoming {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Why a received line could not be turned into an [`Incoming`] message.
#[derive(Debug)]
pub enum MessageError {
    /// Not JSON at all.
    Parse(serde_json::Error),
    /// JSON, but not a well-formed request or notification.
    Invalid {
        id: Option<RequestId>,
        reason: String,
        /// The message looked like a notification (a `method` but no `id`).
        notification: bool,
    },
}

impl MessageError {
    /// Whether the offending message was a notification (and so gets no reply).
    pub fn is_notification(&self) -> bool {
        matches!(self, Self::Invalid { notification: true, .. })
    }

    /// Error response addressed to whatever id could be recovered.
    pub fn into_response(self) -> JsonRpcResponse {
        match self {
            Self::Parse(err) => JsonRpcResponse::failure(None, JsonRpcError::parse_error(err)),
            Self::Invalid { id, reason, .. } => {
                JsonRpcResponse::failure(id, JsonRpcError::invalid_request(reason))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

impl Incoming {
    /// Parse one line of the wire format.
    pub fn parse(line: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(line).map_err(MessageError::Parse)?;
        let Some(object) = value.as_object() else {
            return Err(MessageError::Invalid {
                id: None,
                reason: "message is not an object".to_string(),
                notification: false,
            });
        };
        let notification =
            object.get("id").is_none_or(Value::is_null) && object.contains_key("method");

        let raw: RawMessage = serde_json::from_value(value).map_err(|e| MessageError::Invalid {
            id: None,
            reason: e.to_string(),
            notification,
        })?;

        if raw.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return Err(MessageError::Invalid {
                id: raw.id,
                reason: format!("jsonrpc must be \"{JSONRPC_VERSION}\""),
                notification,
            });
        }

        let Some(method) = raw.method else {
            return Err(MessageError::Invalid {
                id: raw.id,
                reason: "missing method".to_string(),
                notification,
            });
        };

        let jsonrpc = JSONRPC_VERSION.to_string();
        Ok(match raw.id {
            Some(id) => Self::Request(JsonRpcRequest {
                jsonrpc,
                id,
                method,
                params: raw.params,
            }),
            None => Self::Notification(JsonRpcNotification {
                jsonrpc,
                method,
                params: raw.params,
            }),
        })
    }
}

// --- MCP-specific types ---

/// Name and version of one side of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// MCP initialize request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub client: Implementation,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client: Implementation::new("toolhost", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// MCP initialize response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server: Implementation,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
}

/// Server capabilities returned during initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

/// Tool entry returned by tools/list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "inputSchema")]
    pub input_schema: Value,
}

/// Result of tools/list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}

/// Params for tools/call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

/// Result of tools/call.
///
/// `content` mirrors `output` for peers that read the other field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub content: Value,
}

impl CallToolResult {
    pub fn new(output: Value) -> Self {
        Self {
            content: output.clone(),
            output,
        }
    }

    /// The tool's value, whichever field the peer filled in.
    pub fn into_value(self) -> Value {
        if self.output.is_null() {
            self.content
        } else {
            self.output
        }
    }
}

/// Result of shutdown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShutdownResult {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_request() {
        let mut req = JsonRpcRequest::new(1i64, "initialize");
        req.params = Some(serde_json::to_value(InitializeParams::default()).unwrap());
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"initialize\""));
        assert!(json.contains("\"protocolVersion\""));
    }

    #[test]
    fn deserialize_response() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, Some(RequestId::Number(1)));
        assert!(resp.error.is_none());
    }

    #[test]
    fn uncorrelated_error_serializes_null_id() {
        let resp = JsonRpcResponse::failure(None, JsonRpcError::parse_error("bad"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["id"], Value::Null);
        assert_eq!(json["error"]["code"], error_codes::PARSE_ERROR);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn parse_request_and_notification() {
        let req = Incoming::parse(r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#).unwrap();
        assert!(matches!(req, Incoming::Request(r) if r.id == RequestId::from("a")));

        let note =
            Incoming::parse(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(
            note,
            Incoming::Notification(n) if n.method == "notifications/initialized"
        ));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(Incoming::parse("{not json"), Err(MessageError::Parse(_))));

        let err = Incoming::parse(r#"{"jsonrpc":"2.0","id":7}"#).unwrap_err();
        let resp = err.into_response();
        assert_eq!(resp.id, Some(RequestId::Number(7)));
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);

        let err = Incoming::parse(r#"[1,2]"#).unwrap_err();
        assert!(!err.is_notification());
        assert_eq!(err.into_response().id, None);

        let err = Incoming::parse(r#"{"jsonrpc":"1.0","method":"notifications/initialized"}"#)
            .unwrap_err();
        assert!(err.is_notification());
    }

    #[test]
    fn deserialize_tool_descriptor_accepts_both_spellings() {
        let snake = r#"{"name":"dice","description":"Roll","input_schema":{"type":"object"}}"#;
        let camel = r#"{"name":"dice","inputSchema":{"type":"object"}}"#;
        let a: ToolDescriptor = serde_json::from_str(snake).unwrap();
        let b: ToolDescriptor = serde_json::from_str(camel).unwrap();
        assert_eq!(a.input_schema, b.input_schema);
        assert_eq!(b.description, "");
    }

    #[test]
    fn call_tool_result_mirrors_content() {
        let result = CallToolResult::new(serde_json::json!({"result": 3}));
        assert_eq!(result.output, result.content);

        let content_only: CallToolResult =
            serde_json::from_str(r#"{"content":{"result":4}}"#).unwrap();
        assert_eq!(content_only.into_value(), serde_json::json!({"result": 4}));
    }

    #[test]
    fn method_gating() {
        assert!(Method::parse("initialize").unwrap().allowed_before_ready());
        assert!(Method::parse("ping").unwrap().allowed_before_ready());
        assert!(!Method::parse("tools/list").unwrap().allowed_before_ready());
        assert_eq!(Method::parse("initialized"), Some(Method::Initialized));
        assert!(Method::parse("resources/list").is_none());
    }
}
