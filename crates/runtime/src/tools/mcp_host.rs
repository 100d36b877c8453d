//! MCP-backed tool host.

use super::{ToolCall, ToolError, ToolHost};
use crate::Result;
use crate::model::ToolSpec;
use mcp::{Channel, Client, ClientOptions, ServerConfig};
use serde_json::Value;

/// Tool host backed by an MCP server.
///
/// The manifest is fetched once, when the host is created.
pub struct McpToolHost {
    client: Client,
    specs: Vec<ToolSpec>,
}

impl McpToolHost {
    /// Initialize `client` if needed and cache its tool specs.
    pub async fn new(client: Client) -> Result<Self> {
        if !client.is_initialized() {
            client.initialize().await?;
        }
        let specs = client
            .list_tools()
            .await?
            .into_iter()
            .map(ToolSpec::from)
            .collect();
        Ok(Self { client, specs })
    }

    /// Spawn the server process described by `config` and connect to it.
    pub async fn spawn(config: &ServerConfig, options: ClientOptions) -> Result<Self> {
        let channel = Channel::spawn(config)?;
        Self::new(Client::connect_with(channel, options)).await
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Shut the server down and close the connection.
    pub async fn close(&self) -> Result<()> {
        Ok(self.client.close().await?)
    }
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> std::result::Result<Value, ToolError> {
        let result = self
            .client
            .call_tool(&call.name, call.arguments.clone())
            .await?;
        Ok(result.into_value())
    }
}
