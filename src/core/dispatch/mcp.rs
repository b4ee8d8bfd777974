// MCP tool-call transport: JSON-RPC 2.0 over newline-delimited stdio.
//
// The session is generic over its pipes so the same code drives a child
// process in production and an in-memory duplex in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use super::client::{Destination, MessageTransport, PostReceipt};
use crate::core::error::TransportError;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Upper bound on destination-list pages fetched per dispatch.
pub const MAX_LIST_PAGES: usize = 10;
const LIST_PAGE_SIZE: u32 = 200;

/// Names of the two tools the dispatcher invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolNames {
    pub list_destinations: String,
    pub post_message: String,
}

impl Default for ToolNames {
    fn default() -> Self {
        Self {
            list_destinations: "slack_list_channels".to_string(),
            post_message: "slack_post_message".to_string(),
        }
    }
}

/// What the server reported about itself during the handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// A JSON-RPC client session over a pair of pipes.
pub struct McpSession<R, W> {
    lines: Lines<BufReader<R>>,
    /// `None` once closed
    writer: Option<W>,
    next_id: u64,
    request_timeout: Duration,
}

impl<R, W> McpSession<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, request_timeout: Duration) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer: Some(writer),
            next_id: 1,
            request_timeout,
        }
    }

    /// Perform the `initialize` handshake and announce readiness.
    pub async fn initialize(&mut self) -> Result<ServerInfo, TransportError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await?;
        let info: ServerInfo = result
            .get("serverInfo")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        self.notify("notifications/initialized", json!({})).await?;
        log::info!("Connected to tool server {} {}", info.name, info.version);
        Ok(info)
    }

    /// Invoke a tool and return its payload, parsed as JSON when possible.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, TransportError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;

        let text = result
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(TransportError::Tool {
                tool: name.to_string(),
                message: text,
            });
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Send a request and wait, bounded by the request timeout, for its response.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id;
        self.next_id += 1;

        self.write_message(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }))
        .await?;
        log::debug!("-> {} (id {})", method, id);

        match tokio::time::timeout(self.request_timeout, self.read_response(id)).await {
            Ok(response) => response,
            Err(_) => Err(TransportError::Timeout(self.request_timeout)),
        }
    }

    pub async fn notify(&mut self, method: &str, params: Value) -> Result<(), TransportError> {
        self.write_message(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        }))
        .await
    }

    /// Close our side of the pipe, signalling the server to exit.
    ///
    /// The writer is dropped, not just shut down: a child's stdin only
    /// delivers EOF once its handle is gone.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }

    async fn write_message(&mut self, message: &Value) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> Result<Value, TransportError> {
        loop {
            let line = self.lines.next_line().await?.ok_or(TransportError::Closed)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let message: Value = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(_) => {
                    // servers sometimes print banners on stdout
                    log::debug!("Ignoring non-JSON server output: {}", line);
                    continue;
                }
            };

            if let Some(method) = message.get("method").and_then(Value::as_str) {
                match message.get("id") {
                    Some(request_id) => self.answer_server_request(method, request_id.clone()).await?,
                    None => log::debug!("<- notification {}", method),
                }
                continue;
            }

            if message.get("id").and_then(Value::as_u64) != Some(id) {
                log::debug!("Ignoring response for another request: {}", line);
                continue;
            }

            if let Some(error) = message.get("error") {
                return Err(TransportError::Rpc {
                    code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                });
            }
            return Ok(message.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    async fn answer_server_request(&mut self, method: &str, id: Value) -> Result<(), TransportError> {
        let reply = if method == "ping" {
            json!({ "jsonrpc": "2.0", "id": id, "result": {} })
        } else {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method not supported: {method}") },
            })
        };
        self.write_message(&reply).await
    }
}

/// `MessageTransport` backed by the messaging tools of an MCP session.
pub struct McpToolTransport<'a, R, W> {
    session: &'a mut McpSession<R, W>,
    tools: ToolNames,
}

impl<'a, R, W> McpToolTransport<'a, R, W> {
    pub fn new(session: &'a mut McpSession<R, W>, tools: ToolNames) -> Self {
        Self { session, tools }
    }
}

/// Turn a messaging API reply with `"ok": false` into a tool error.
fn check_ok(tool: &str, reply: &Value) -> Result<(), TransportError> {
    match reply.get("ok").and_then(Value::as_bool) {
        Some(false) => Err(TransportError::Tool {
            tool: tool.to_string(),
            message: reply
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request rejected")
                .to_string(),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl<'a, R, W> MessageTransport for McpToolTransport<'a, R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn list_destinations(&mut self) -> Result<Vec<Destination>, TransportError> {
        let tool = self.tools.list_destinations.clone();
        let mut destinations = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut arguments = json!({ "limit": LIST_PAGE_SIZE });
            if let Some(cursor) = &cursor {
                arguments["cursor"] = Value::String(cursor.clone());
            }
            let reply = self.session.call_tool(&tool, arguments).await?;
            check_ok(&tool, &reply)?;

            if let Some(channels) = reply.get("channels").and_then(Value::as_array) {
                destinations.extend(channels.iter().filter_map(|c| {
                    Some(Destination {
                        id: c.get("id")?.as_str()?.to_string(),
                        name: c.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    })
                }));
            }

            cursor = reply
                .pointer("/response_metadata/next_cursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        if cursor.is_some() {
            log::warn!(
                "Destination list truncated after {} pages; channels beyond it cannot be matched",
                MAX_LIST_PAGES
            );
        }

        log::debug!("Tool server listed {} destinations", destinations.len());
        Ok(destinations)
    }

    async fn post_message(&mut self, destination_id: &str, body: &str) -> Result<PostReceipt, TransportError> {
        let tool = self.tools.post_message.clone();
        let reply = self
            .session
            .call_tool(&tool, json!({ "channel_id": destination_id, "text": body }))
            .await?;
        check_ok(&tool, &reply)?;

        Ok(PostReceipt {
            message_id: reply.get("ts").and_then(Value::as_str).map(str::to_string),
        })
    }
}
