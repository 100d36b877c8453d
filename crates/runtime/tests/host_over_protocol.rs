//! Session driving a real MCP server through the protocol client.

use std::sync::Mutex;

use async_trait::async_trait;
use mcp::{
    BoxError, Channel, Client, Implementation, InputSchema, PropertySchema, Server, Tool,
    ToolRegistry,
};
use runtime::{
    Backend, McpToolHost, Message, ModelError, ModelRequest, ModelResponse, Role, Session,
    ToolHost, Usage,
};
use serde_json::{Map, Value, json};
use tokio::io::{duplex, split};

struct Add {
    schema: InputSchema,
}

#[async_trait]
impl Tool for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two integers"
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, BoxError> {
        let a = arguments["a"].as_i64().ok_or("a must be an integer")?;
        let b = arguments["b"].as_i64().ok_or("b must be an integer")?;
        Ok(json!({ "sum": a + b }))
    }
}

struct Script {
    replies: Mutex<Vec<&'static str>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl Script {
    fn new(mut replies: Vec<&'static str>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Backend for Script {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        self.seen.lock().unwrap().push(request.messages.to_vec());
        let text = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ModelError::InvalidResponse("script exhausted".into()))?;
        Ok(ModelResponse {
            text: text.to_string(),
            usage: Usage::default(),
        })
    }
}

async fn host() -> (McpToolHost, tokio::task::JoinHandle<mcp::Result<()>>) {
    let registry = ToolRegistry::new();
    registry
        .register(
            Add {
                schema: InputSchema::object()
                    .property("a", PropertySchema::integer())
                    .property("b", PropertySchema::integer())
                    .required(["a", "b"]),
            },
            false,
        )
        .await
        .unwrap();
    let server = Server::new(Implementation::new("math", "0.1.0"), registry);

    let (server_side, client_side) = duplex(64 * 1024);
    let (sr, sw) = split(server_side);
    let (cr, cw) = split(client_side);
    let task = tokio::spawn(server.run(Channel::new(sr, sw)));

    let host = McpToolHost::new(Client::connect(Channel::new(cr, cw)))
        .await
        .unwrap();
    (host, task)
}

#[tokio::test]
async fn tool_results_and_errors_reach_the_model() {
    let (host, server) = host().await;
    assert_eq!(host.specs().len(), 1);
    assert_eq!(host.specs()[0].name, "add");

    let backend = Script::new(vec![
        concat!(
            r#"{"tool_calls":["#,
            r#"{"name":"add","arguments":{"a":2,"b":3}},"#,
            r#"{"name":"add","arguments":{"a":"x"}},"#,
            r#"{"name":"sub","arguments":{}}"#,
            r#"]}"#,
        ),
        "2 + 3 = 5",
    ]);
    let mut session = Session::new(backend, host).with_system("math helper");

    let answer = session.chat("what is 2 + 3?").await.unwrap();
    assert_eq!(answer, "2 + 3 = 5");
    assert_eq!(session.rounds(), 1);

    let status = session
        .history()
        .iter()
        .find(|m| m.role == Role::ToolResult)
        .unwrap()
        .content
        .clone();
    let lines: Vec<&str> = status.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], r#"[add] success: {"sum":5}"#);
    assert!(lines[1].starts_with("[add] error: invalid input:"), "{}", lines[1]);
    assert!(lines[1].contains("b:"), "{}", lines[1]);
    assert!(!lines[1].contains("invalid input for"), "{}", lines[1]);
    assert_eq!(lines[2], "[sub] error: tool not found: sub");

    session.host().close().await.unwrap();
    server.await.unwrap().unwrap();
}
