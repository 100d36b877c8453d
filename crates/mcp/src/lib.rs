//! MCP (Model Context Protocol) engine: both ends of a tool-serving connection.
//!
//! The server side owns a [`ToolRegistry`] and answers JSON-RPC requests on a
//! line-delimited [`Channel`]. The client side correlates concurrent requests
//! with their responses.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Channel, Client, Implementation, Server, ServerConfig, ToolRegistry};
//! use std::collections::HashMap;
//!
//! # async fn example() -> mcp::Result<()> {
//! // Server process: expose the registry on stdio.
//! let registry = ToolRegistry::new();
//! let server = Server::new(Implementation::new("demo", "0.1.0"), registry);
//! # if false {
//! server.run(Channel::stdio()).await?;
//! # }
//!
//! // Host process: spawn the server and talk to it.
//! let config = ServerConfig {
//!     name: "demo".to_string(),
//!     command: "toolhost".to_string(),
//!     args: vec!["serve".to_string()],
//!     env: HashMap::new(),
//! };
//! let client = Client::connect(Channel::spawn(&config)?);
//! client.initialize().await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

mod channel;
mod client;
mod error;
mod protocol;
mod registry;
mod schema;
mod server;

pub use channel::{Channel, ChannelReader, ChannelWriter, MAX_LINE_SIZE, ServerConfig};
pub use client::{Client, ClientOptions};
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, Method,
    PING_ACK, PROTOCOL_VERSION, RequestId, ServerCapabilities, ToolDescriptor, ToolsCapability,
    error_codes,
};
pub use registry::{BoxError, Tool, ToolError, ToolRegistry};
pub use schema::{InputSchema, PropertySchema, ValueKind, Violation};
pub use server::{Lifecycle, Server};
