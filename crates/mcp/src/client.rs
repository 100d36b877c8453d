//! MCP client: request/response correlation over a [`Channel`].
//!
//! Every request gets a fresh numeric id and a one-shot slot in the pending
//! table. A background task reads response lines and resolves the slot whose id
//! matches, so responses may arrive in any order. When the channel closes, every
//! outstanding slot is failed exactly once with [`Error::ConnectionClosed`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, warn};

use crate::channel::{Channel, ChannelReader, ChannelWriter, MAX_LINE_SIZE};
use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, Method,
    PROTOCOL_VERSION, RequestId, ToolDescriptor,
};

type Slot = oneshot::Sender<Result<Value>>;

#[derive(Default)]
struct PendingTable {
    entries: HashMap<RequestId, Slot>,
    closed: bool,
}

impl PendingTable {
    /// Fail every outstanding entry and refuse new ones.
    fn fail_all(&mut self) -> usize {
        self.closed = true;
        let failed = self.entries.len();
        for (_, slot) in self.entries.drain() {
            let _ = slot.send(Err(Error::ConnectionClosed));
        }
        failed
    }
}

/// Options for [`Client::connect_with`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Identity sent in `initialize`.
    pub client: Implementation,
    /// Per-request deadline. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Logging context for client events.
    pub span: Span,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client: InitializeParams::default().client,
            timeout: None,
            span: tracing::info_span!("client"),
        }
    }
}

/// Handle to a connected MCP server.
pub struct Client {
    writer: Mutex<ChannelWriter>,
    pending: Arc<Mutex<PendingTable>>,
    reader: JoinHandle<()>,
    next_id: AtomicI64,
    initialized: AtomicBool,
    server_info: Mutex<Option<InitializeResult>>,
    options: ClientOptions,
}

impl Client {
    /// Connect over `channel` with default options.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(channel: Channel) -> Self {
        Self::connect_with(channel, ClientOptions::default())
    }

    pub fn connect_with(channel: Channel, options: ClientOptions) -> Self {
        let (reader, writer) = channel.split();
        let pending = Arc::new(Mutex::new(PendingTable::default()));
        let reader = tokio::spawn(
            read_loop(reader, Arc::clone(&pending)).instrument(options.span.clone()),
        );

        Self {
            writer: Mutex::new(writer),
            pending,
            reader,
            next_id: AtomicI64::new(1),
            initialized: AtomicBool::new(false),
            server_info: Mutex::new(None),
            options,
        }
    }

    /// Perform the `initialize` / `initialized` handshake.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client: self.options.client.clone(),
        };
        let result: InitializeResult = self
            .request_typed(Method::Initialize.as_str(), Some(serde_json::to_value(params)?))
            .await?;

        self.notify(Method::Initialized.as_str(), None).await?;

        self.options.span.in_scope(|| {
            info!(
                server = %result.server.name,
                server_version = %result.server.version,
                protocol_version = %result.protocol_version,
                "initialized"
            )
        });
        *self.server_info.lock().await = Some(result.clone());
        self.initialized.store(true, Ordering::SeqCst);
        Ok(result)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Server identity from the handshake.
    pub async fn server_info(&self) -> Option<InitializeResult> {
        self.server_info.lock().await.clone()
    }

    /// Number of requests still waiting for a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.entries.len()
    }

    /// Send a request and wait for its response.
    ///
    /// Only `initialize` and `ping` may be called before [`Client::initialize`].
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let allowed = Method::parse(method).is_some_and(|m| m.allowed_before_ready());
        if !allowed && !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        self.request(method, params).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.call(Method::Ping.as_str(), None).await.map(|_| ())
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let value = self.call(Method::ToolsList.as_str(), None).await?;
        let result: ListToolsResult = decode(value)?;
        Ok(result.tools)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let value = self
            .call(Method::ToolsCall.as_str(), Some(serde_json::to_value(params)?))
            .await?;
        decode(value)
    }

    /// Send a notification. No response is expected.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let mut notification = JsonRpcNotification::new(method);
        notification.params = params;
        let line = serde_json::to_string(&notification)?;
        self.writer.lock().await.send(&line).await
    }

    /// Ask the server to shut down, then tear the connection down.
    ///
    /// The `shutdown` request is best effort; its failure is logged, not returned.
    /// Any request still pending afterwards fails with [`Error::ConnectionClosed`].
    pub async fn close(&self) -> Result<()> {
        let span = self.options.span.clone();

        match self.request(Method::Shutdown.as_str(), None).await {
            Ok(_) => span.in_scope(|| debug!("server acknowledged shutdown")),
            Err(e) => span.in_scope(|| warn!(error = %e, "shutdown request failed")),
        }

        if let Err(e) = self.writer.lock().await.close().await {
            span.in_scope(|| debug!(error = %e, "closing channel failed"));
        }

        let failed = self.pending.lock().await.fail_all();
        if failed > 0 {
            span.in_scope(|| warn!(failed, "failed outstanding requests on close"));
        }
        self.reader.abort();
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request_typed<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<R> {
        let value = self.request(method, params).await?;
        decode(value)
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        request.params = params;
        let line = serde_json::to_string(&request)?;
        if line.len() > MAX_LINE_SIZE {
            return Err(Error::OutputTooLarge {
                size: line.len(),
                max: MAX_LINE_SIZE,
            });
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(Error::ConnectionClosed);
            }
            pending.entries.insert(id.clone(), tx);
        }

        self.options
            .span
            .in_scope(|| debug!(%id, method, "sending request"));

        let sent = self.writer.lock().await.send(&line).await;
        if let Err(e) = sent {
            self.pending.lock().await.entries.remove(&id);
            return Err(e);
        }

        let received = match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.lock().await.entries.remove(&id);
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        received.unwrap_or_else(|_| Err(Error::ConnectionClosed))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R> {
    serde_json::from_value(value).map_err(|e| Error::InvalidResponse(e.to_string()))
}

async fn read_loop(mut reader: ChannelReader, pending: Arc<Mutex<PendingTable>>) {
    loop {
        match reader.receive().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => route_response(&line, &pending).await,
            Ok(None) => {
                debug!("server closed the channel");
                break;
            }
            // An unreadable line may have been any pending response.
            Err(e) => {
                warn!(error = %e, "channel read failed");
                break;
            }
        }
    }

    let failed = pending.lock().await.fail_all();
    if failed > 0 {
        warn!(failed, "connection lost with requests outstanding");
    }
}

async fn route_response(line: &str, pending: &Mutex<PendingTable>) {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "dropping unparseable line");
            return;
        }
    };

    if value.get("method").is_some() {
        debug!("ignoring server-initiated message");
        return;
    }

    let id = match value.get("id").cloned().map(serde_json::from_value::<RequestId>) {
        Some(Ok(id)) => id,
        _ => {
            warn!(line, "dropping response without a usable id");
            return;
        }
    };

    let Some(slot) = pending.lock().await.entries.remove(&id) else {
        warn!(%id, "dropping response for unknown id");
        return;
    };

    let has_outcome = value.get("result").is_some() || value.get("error").is_some();
    let outcome = if has_outcome {
        serde_json::from_value::<JsonRpcResponse>(value)
            .map_err(|e| Error::InvalidResponse(e.to_string()))
            .and_then(|response| response.into_result().map_err(Error::Rpc))
    } else {
        Err(Error::InvalidResponse(format!(
            "response {id} has neither result nor error"
        )))
    };

    let _ = slot.send(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcError, error_codes};
    use serde_json::json;
    use tokio::io::{AsyncWriteExt, duplex, split};

    fn connected(options: ClientOptions) -> (Client, Channel) {
        let (a, b) = duplex(64 * 1024);
        let (ar, aw) = split(a);
        let (br, bw) = split(b);
        (
            Client::connect_with(Channel::new(ar, aw), options),
            Channel::new(br, bw),
        )
    }

    async fn next_message(peer: &mut Channel) -> Value {
        serde_json::from_str(&peer.receive().await.unwrap().unwrap()).unwrap()
    }

    async fn reply(peer: &mut Channel, id: &Value, result: Value) {
        let line = json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string();
        peer.send(&line).await.unwrap();
    }

    async fn initialized(options: ClientOptions) -> (Client, Channel) {
        let (client, mut peer) = connected(options);
        let (result, ()) = tokio::join!(client.initialize(), async {
            let request = next_message(&mut peer).await;
            assert_eq!(request["method"], "initialize");
            assert_eq!(request["params"]["protocolVersion"], PROTOCOL_VERSION);
            reply(
                &mut peer,
                &request["id"],
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "server": { "name": "fake", "version": "1" },
                }),
            )
            .await;
            let notification = next_message(&mut peer).await;
            assert_eq!(notification["method"], "notifications/initialized");
            assert!(notification.get("id").is_none());
        });
        assert_eq!(result.unwrap().server.name, "fake");
        (client, peer)
    }

    #[tokio::test]
    async fn calls_require_initialize() {
        let (client, _peer) = connected(ClientOptions::default());
        assert!(matches!(
            client.call("tools/list", None).await,
            Err(Error::NotInitialized)
        ));
        assert!(matches!(client.list_tools().await, Err(Error::NotInitialized)));
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn out_of_order_responses_reach_their_callers() {
        let (client, mut peer) = initialized(ClientOptions::default()).await;

        let server = async {
            let mut requests = Vec::new();
            for _ in 0..3 {
                requests.push(next_message(&mut peer).await);
            }
            for request in requests.iter().rev() {
                let marker = request["params"]["marker"].clone();
                reply(&mut peer, &request["id"], json!({ "echo": marker })).await;
            }
        };

        let (a, b, c, ()) = tokio::join!(
            client.call("ping", Some(json!({ "marker": "a" }))),
            client.call("ping", Some(json!({ "marker": "b" }))),
            client.call("ping", Some(json!({ "marker": "c" }))),
            server,
        );

        assert_eq!(a.unwrap()["echo"], "a");
        assert_eq!(b.unwrap()["echo"], "b");
        assert_eq!(c.unwrap()["echo"], "c");
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let (client, mut peer) = initialized(ClientOptions::default()).await;
        let mut seen = Vec::new();
        for _ in 0..3 {
            let (result, ()) = tokio::join!(client.ping(), async {
                let request = next_message(&mut peer).await;
                seen.push(request["id"].clone());
                reply(&mut peer, &request["id"], json!("pong")).await;
            });
            result.unwrap();
        }
        seen.dedup();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn error_responses_keep_code_message_and_data() {
        let (client, mut peer) = initialized(ClientOptions::default()).await;

        let (result, ()) = tokio::join!(client.call_tool("nonexistent", Map::new()), async {
            let request = next_message(&mut peer).await;
            assert_eq!(request["params"]["name"], "nonexistent");
            let error =
                JsonRpcError::new(error_codes::TOOL_NOT_FOUND, "tool not found: nonexistent")
                    .with_data(json!({ "tool": "nonexistent" }));
            let id = serde_json::from_value(request["id"].clone()).unwrap();
            let line = JsonRpcResponse::failure(id, error);
            peer.send(&serde_json::to_string(&line).unwrap()).await.unwrap();
        });

        let err = result.unwrap_err();
        assert_eq!(err.code(), Some(error_codes::TOOL_NOT_FOUND));
        let Error::Rpc(rpc) = err else { unreachable!() };
        assert_eq!(rpc.data.unwrap()["tool"], "nonexistent");
    }

    #[tokio::test]
    async fn closing_the_channel_fails_pending_requests() {
        let (client, mut peer) = initialized(ClientOptions::default()).await;

        let (result, ()) = tokio::join!(client.call("tools/list", None), async {
            next_message(&mut peer).await;
            peer.close().await.unwrap();
        });

        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert_eq!(client.pending_count().await, 0);
        assert!(matches!(client.ping().await, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn oversized_response_fails_the_connection() {
        let (a, b) = duplex(4 * MAX_LINE_SIZE);
        let (ar, aw) = split(a);
        let (br, mut bw) = split(b);
        let client = Client::connect(Channel::new(ar, aw));
        let (mut requests, _) = Channel::new(br, tokio::io::sink()).split();

        let (result, ()) = tokio::join!(client.ping(), async {
            let request: Value =
                serde_json::from_str(&requests.receive().await.unwrap().unwrap()).unwrap();
            let response = json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "result": "x".repeat(MAX_LINE_SIZE),
            });
            let mut bytes = response.to_string().into_bytes();
            bytes.push(b'\n');
            bw.write_all(&bytes).await.unwrap();
        });

        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn oversized_request_is_refused_locally() {
        let (client, mut peer) = connected(ClientOptions::default());

        let blob = json!({ "blob": "x".repeat(MAX_LINE_SIZE) });
        let err = client.call("ping", Some(blob)).await.unwrap_err();
        assert!(matches!(err, Error::OutputTooLarge { .. }));
        assert_eq!(client.pending_count().await, 0);

        let (result, ()) = tokio::join!(client.ping(), async {
            let request = next_message(&mut peer).await;
            assert_eq!(request["method"], "ping");
            reply(&mut peer, &request["id"], json!("pong")).await;
        });
        result.unwrap();
    }

    #[tokio::test]
    async fn response_without_outcome_is_invalid() {
        let (client, mut peer) = initialized(ClientOptions::default()).await;
        let (result, ()) = tokio::join!(client.ping(), async {
            let request = next_message(&mut peer).await;
            let line = json!({ "jsonrpc": "2.0", "id": request["id"] }).to_string();
            peer.send(&line).await.unwrap();
        });
        assert!(matches!(result, Err(Error::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn timeout_removes_the_pending_entry() {
        let options = ClientOptions {
            timeout: Some(Duration::from_millis(50)),
            ..ClientOptions::default()
        };
        let (client, mut peer) = initialized(options).await;

        let (result, _) = tokio::join!(client.call("tools/list", None), next_message(&mut peer));
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(client.pending_count().await, 0);
    }

    #[tokio::test]
    async fn close_swallows_shutdown_failure() {
        let (client, mut peer) = initialized(ClientOptions::default()).await;

        let (result, ()) = tokio::join!(client.close(), async {
            let request = next_message(&mut peer).await;
            assert_eq!(request["method"], "shutdown");
            let error = json!({ "code": error_codes::INTERNAL_ERROR, "message": "nope" });
            let line = json!({ "jsonrpc": "2.0", "id": request["id"], "error": error }).to_string();
            peer.send(&line).await.unwrap();
        });

        result.unwrap();
        assert!(!client.is_initialized());
        assert!(peer.receive().await.unwrap().is_none());
    }
}
