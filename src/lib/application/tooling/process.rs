use super::error::ToolInvokeError;
use super::interface::ToolServerInterface;
use super::types::{ResourceContents, ResourceDescriptor, ToolCallResult, ToolDescriptor};
use crate::config::ServerConfig;
use crate::constants::MCP_PROTOCOL_VERSION;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, info, warn};

type PendingMap = HashMap<String, oneshot::Sender<Result<Value, ToolInvokeError>>>;

/// A live session with an MCP server running as a child process.
///
/// The child is spawned with `kill_on_drop`, so dropping the last clone
/// releases it even when [`McpProcess::shutdown`] is never reached.
#[derive(Clone)]
pub struct McpProcess {
    inner: Arc<McpProcessInner>,
}

struct McpProcessInner {
    server: ServerConfig,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<PendingMap>,
    id_counter: AtomicU64,
    instructions: AsyncMutex<Option<String>>,
    tool_cache: AsyncMutex<Option<Vec<ToolDescriptor>>>,
}

impl McpProcess {
    /// Spawn the server and complete the `initialize` handshake.
    pub async fn connect(server: ServerConfig) -> Result<Self, ToolInvokeError> {
        let inner = Arc::new(McpProcessInner {
            server,
            child: AsyncMutex::new(None),
            writer: AsyncMutex::new(None),
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            instructions: AsyncMutex::new(None),
            tool_cache: AsyncMutex::new(None),
        });
        inner.spawn().await?;
        if let Err(err) = inner.initialize_sequence().await {
            inner.reset().await;
            return Err(err);
        }
        info!(server = %inner.server.name, "Connected to MCP server");
        Ok(Self { inner })
    }

    pub fn server_name(&self) -> &str {
        &self.inner.server.name
    }

    /// Instructions the server returned from `initialize`, if any.
    pub async fn instructions(&self) -> Option<String> {
        self.inner.instructions.lock().await.clone()
    }

    /// Close stdin, stop the child and fail any request still in flight.
    pub async fn shutdown(&self) {
        debug!(server = %self.inner.server.name, "Shutting down MCP server");
        self.inner.reset().await;
    }
}

#[async_trait]
impl ToolServerInterface for McpProcess {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
        if let Some(cached) = self.inner.tool_cache.lock().await.clone() {
            return Ok(cached);
        }
        let tools: Vec<ToolDescriptor> = self.inner.list_paginated("tools/list", "tools").await?;
        *self.inner.tool_cache.lock().await = Some(tools.clone());
        Ok(tools)
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, ToolInvokeError> {
        self.inner
            .list_paginated("resources/list", "resources")
            .await
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ToolInvokeError> {
        let result = self
            .inner
            .send_request("resources/read", json!({ "uri": uri }))
            .await?;
        let contents = result.get("contents").cloned().unwrap_or(Value::Array(Vec::new()));
        self.inner.decode("resources/read", contents)
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ToolInvokeError> {
        let params = json!({
            "name": tool,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        });
        let result = self.inner.send_request("tools/call", params).await?;
        self.inner.decode("tools/call", result)
    }
}

impl McpProcessInner {
    async fn spawn(self: &Arc<Self>) -> Result<(), ToolInvokeError> {
        let mut command = Command::new(&self.server.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.server.workdir {
            command.current_dir(dir);
        }
        if !self.server.args.is_empty() {
            command.args(&self.server.args);
        }
        command.envs(&self.server.env);

        let mut child = command.spawn().map_err(|source| ToolInvokeError::Spawn {
            server: self.server.name.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.transport_error("failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.transport_error("failed to capture server stdout"))?;

        *self.writer.lock().await = Some(BufWriter::new(stdin));
        *self.child.lock().await = Some(child);

        let weak = Arc::downgrade(self);
        let server = self.server.name.clone();
        tokio::spawn(async move {
            reader_loop(weak, server, stdout).await;
        });
        Ok(())
    }

    async fn initialize_sequence(&self) -> Result<(), ToolInvokeError> {
        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "title": "Last-Mile Disruption Agent"
            },
            "capabilities": {}
        });
        let init_result = self.send_request("initialize", params).await?;
        if let Some(text) = init_result.get("instructions").and_then(Value::as_str) {
            *self.instructions.lock().await = Some(text.to_string());
        }
        debug!(
            server = %self.server.name,
            protocol = init_result.get("protocolVersion").and_then(serde_json::Value::as_str),
            "MCP initialize completed"
        );
        self.send_notification("notifications/initialized", json!({}))
            .await
    }

    /// Collect every page of a cursor-paginated list method.
    async fn list_paginated<T: DeserializeOwned>(
        &self,
        method: &str,
        field: &str,
    ) -> Result<Vec<T>, ToolInvokeError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();

        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.send_request(method, params).await?;
            let page = result.get(field).cloned().unwrap_or(Value::Array(Vec::new()));
            let mut decoded: Vec<T> = self.decode(method, page)?;
            items.append(&mut decoded);

            match result.get("nextCursor").and_then(Value::as_str) {
                Some(next) if !next.is_empty() && seen.insert(next.to_string()) => {
                    cursor = Some(next.to_string());
                }
                Some(next) if !next.is_empty() => {
                    warn!(server = %self.server.name, method, cursor = next, "Server repeated a pagination cursor");
                    break;
                }
                _ => break,
            }
        }

        Ok(items)
    }

    fn decode<T: DeserializeOwned>(&self, method: &str, value: Value) -> Result<T, ToolInvokeError> {
        serde_json::from_value(value).map_err(|source| ToolInvokeError::UnexpectedPayload {
            server: self.server.name.clone(),
            method: method.to_string(),
            source,
        })
    }

    async fn process_inbound_message(&self, value: Value) -> Result<(), ToolInvokeError> {
        if let Some(id) = value.get("id").cloned() {
            if value.get("method").is_some() {
                self.handle_server_request(id, value).await
            } else {
                self.handle_response(id, value).await;
                Ok(())
            }
        } else {
            if value.get("method").is_some() {
                self.handle_notification(value).await;
            }
            Ok(())
        }
    }

    async fn handle_response(&self, id: Value, value: Value) {
        let Some(key) = response_key(&id) else {
            return;
        };

        let responder = self.pending.lock().await.remove(&key);
        let Some(sender) = responder else {
            debug!(
                server = %self.server.name,
                response_id = key.as_str(),
                "received response for unknown request"
            );
            return;
        };

        if let Some(error) = value.get("error") {
            let rpc_error = match error.as_object() {
                Some(err) => ToolInvokeError::Rpc {
                    server: self.server.name.clone(),
                    code: err.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                    message: err
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                },
                None => self.transport_error("missing error payload in response"),
            };
            let _ = sender.send(Err(rpc_error));
        } else {
            let result = value.get("result").cloned().unwrap_or(Value::Null);
            let _ = sender.send(Ok(result));
        }
    }

    async fn handle_server_request(&self, id: Value, value: Value) -> Result<(), ToolInvokeError> {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match method {
            "ping" => self.send_response(id, json!({})).await,
            other => {
                warn!(
                    server = %self.server.name,
                    method = other,
                    "server sent unsupported request"
                );
                let error = json!({
                    "code": -32601,
                    "message": format!("client does not implement method '{other}'"),
                });
                self.send_error(id, error).await
            }
        }
    }

    async fn handle_notification(&self, value: Value) {
        let Some(method) = value.get("method").and_then(Value::as_str) else {
            return;
        };
        debug!(
            server = %self.server.name,
            method,
            "received notification from server"
        );
        if method == "notifications/tools/list_changed" {
            // Refetched lazily; a request from here would wait on this reader.
            self.tool_cache.lock().await.take();
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ToolInvokeError> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        debug!(server = %self.server.name, method, request_id = id.as_str(), "Sending MCP request");
        if let Err(err) = self.write_message(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ToolInvokeError::Cancelled {
                server: self.server.name.clone(),
            }),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn send_response(&self, id: Value, result: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        });
        self.write_message(&payload).await
    }

    async fn send_error(&self, id: Value, error: Value) -> Result<(), ToolInvokeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error
        });
        self.write_message(&payload).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let encoded =
            serde_json::to_string(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.name.clone(),
                source,
            })?;

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| ToolInvokeError::Terminated {
                server: self.server.name.clone(),
            })?;
        let io_error = |source: std::io::Error| ToolInvokeError::Transport {
            server: self.server.name.clone(),
            message: source.to_string(),
        };
        stream.write_all(encoded.as_bytes()).await.map_err(io_error)?;
        stream.write_all(b"\n").await.map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;
        Ok(())
    }

    async fn reset(&self) {
        self.writer.lock().await.take();

        let running = self.child.lock().await.take();
        if let Some(mut child) = running {
            if let Err(err) = child.kill().await {
                debug!(
                    server = %self.server.name,
                    %err,
                    "failed to kill MCP server process (may have already exited)"
                );
            }
            let _ = child.wait().await;
        }

        self.fail_all_pending().await;
        self.tool_cache.lock().await.take();
        self.instructions.lock().await.take();
    }

    async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(ToolInvokeError::Terminated {
                server: self.server.name.clone(),
            }));
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }

    fn transport_error(&self, message: impl Into<String>) -> ToolInvokeError {
        ToolInvokeError::Transport {
            server: self.server.name.clone(),
            message: message.into(),
        }
    }
}

async fn reader_loop(inner: Weak<McpProcessInner>, server: String, stdout: ChildStdout) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(raw)) = lines.next_line().await {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.starts_with('{') {
            debug!(server = %server, line = trimmed, "skipping non-JSON line from MCP server");
            continue;
        }
        let Some(process) = inner.upgrade() else {
            return;
        };
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => {
                if let Err(err) = process.process_inbound_message(value).await {
                    warn!(server = %server, %err, "failed to process message from MCP server");
                }
            }
            Err(source) => {
                warn!(server = %server, line = trimmed, %source, "received invalid JSON from MCP server");
            }
        }
    }

    debug!(server = %server, "MCP server stdout closed");
    if let Some(process) = inner.upgrade() {
        process.writer.lock().await.take();
        process.fail_all_pending().await;
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}
