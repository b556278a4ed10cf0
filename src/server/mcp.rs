//! JSON-RPC 2.0 protocol implementation over stdio.
//!
//! This module provides the core server implementation including:
//! - JSON-RPC 2.0 request/response handling
//! - Tool definitions and schemas
//! - Concurrent request handling with a single ordered writer
//! - Request cancellation via `notifications/cancelled`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::{handle_tool_call, SharedState};
use crate::error::{McpError, McpResult};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// Capacity of the outbound line queue feeding the writer task.
const OUTBOUND_CAPACITY: usize = 256;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier (null if unknown, must always be present).
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC 2.0 notification sent by the server.
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
}

/// Server information returned during initialization.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// The server name identifier.
    pub name: String,
    /// The server version string.
    pub version: String,
}

/// Server capabilities advertised to clients.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change dynamically.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Result of the initialize handshake.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    /// The protocol version supported.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: Capabilities,
    /// Server identification information.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Tool definition with JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Unique tool name (used in tool calls).
    pub name: String,
    /// Human-readable description of the tool.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// The name of the tool to invoke.
    pub name: String,
    /// Optional arguments for the tool.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Parameters for a `notifications/cancelled` message.
#[derive(Debug, Deserialize)]
pub struct CancelParams {
    /// Id of the request to cancel.
    #[serde(rename = "requestId")]
    pub request_id: Value,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// The content type (e.g., "text").
    #[serde(rename = "type")]
    pub content_type: String,
    /// The text content of the result.
    pub text: String,
}

/// Result of a tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// The result content items.
    pub content: Vec<ToolResultContent>,
    /// Whether the result represents an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Handle for queueing lines to the single stdout writer.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<String>,
}

impl Notifier {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    async fn send_line(&self, line: String) -> McpResult<()> {
        self.tx
            .send(line)
            .await
            .map_err(|_| McpError::ExecutionFailed {
                message: "output channel closed".to_string(),
            })
    }

    /// Queue a server notification.
    pub async fn notify(&self, method: &str, params: Value) -> McpResult<()> {
        let line = serde_json::to_string(&JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        })?;
        self.send_line(line).await
    }

    /// Queue a response.
    pub async fn respond(&self, response: &JsonRpcResponse) -> McpResult<()> {
        let line = serde_json::to_string(response)?;
        debug!(response = %line, "Sending response");
        self.send_line(line).await
    }
}

/// Running requests by id key, tagged with the sequence number of the
/// registration that owns the entry.
type InflightMap = Arc<Mutex<HashMap<String, (u64, AbortHandle)>>>;

/// Record a running request. A later request reusing an id takes over the
/// entry, so cancellation targets the newest request with that id.
fn register(
    inflight: &mut HashMap<String, (u64, AbortHandle)>,
    key: String,
    seq: u64,
    abort: AbortHandle,
) {
    if inflight.insert(key.clone(), (seq, abort)).is_some() {
        warn!(request_id = %key, "Duplicate in-flight request id");
    }
}

/// JSON-RPC server running over stdio.
///
/// Each request runs on its own task; responses and notifications are
/// written by one writer task so lines never interleave.
#[derive(Clone)]
pub struct McpServer {
    /// Shared application state.
    state: SharedState,
    /// Abort handles of running requests, keyed by request id.
    inflight: InflightMap,
    /// Source of registration sequence numbers.
    next_seq: Arc<AtomicU64>,
}

impl McpServer {
    /// Create a new server
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run the server using async stdio
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Insight orchestrator server starting...");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests from `reader` until EOF, writing to `writer`.
    ///
    /// In-flight requests are allowed to finish after EOF.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let writer_task = tokio::spawn(write_lines(writer, rx));
        let notifier = Notifier::new(tx);

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut tasks = JoinSet::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            // EOF reached
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let request = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    let response =
                        JsonRpcResponse::error(None, -32700, format!("Parse error: {}", e));
                    if notifier.respond(&response).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            if request.method == "notifications/cancelled" {
                self.handle_cancelled(request.params);
                continue;
            }

            let server = self.clone();
            let task_notifier = notifier.clone();
            let key = request.id.as_ref().map(request_key);
            let task_key = key.clone();
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

            {
                // hold the lock across spawn so the task cannot deregister first
                let mut inflight = self.lock_inflight();
                let abort = tasks.spawn(async move {
                    let id = request.id.clone();
                    if let Some(response) = server.handle_request(request, &task_notifier).await {
                        if let Err(e) = task_notifier.respond(&response).await {
                            warn!(id = ?id, error = %e, "Dropping response");
                        }
                    }
                    if let Some(key) = task_key {
                        server.deregister(&key, seq);
                    }
                });
                if let Some(key) = key {
                    register(&mut inflight, key, seq, abort);
                }
            }

            // reap finished tasks without blocking
            while let Some(result) = tasks.try_join_next() {
                log_join(result);
            }
        }

        while let Some(result) = tasks.join_next().await {
            log_join(result);
        }

        drop(notifier);
        match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        }
    }

    fn lock_inflight(&self) -> MutexGuard<'_, HashMap<String, (u64, AbortHandle)>> {
        self.inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop the entry for `key` if registration `seq` still owns it.
    fn deregister(&self, key: &str, seq: u64) {
        let mut inflight = self.lock_inflight();
        if inflight.get(key).is_some_and(|(owner, _)| *owner == seq) {
            inflight.remove(key);
        }
    }

    /// Abort a running request. Returns whether one was found.
    pub fn cancel_request(&self, request_id: &Value) -> bool {
        match self.lock_inflight().remove(&request_key(request_id)) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn handle_cancelled(&self, params: Option<Value>) {
        let params: CancelParams = match params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            _ => {
                debug!("Ignoring malformed cancellation");
                return;
            }
        };

        if self.cancel_request(&params.request_id) {
            info!(
                request_id = %params.request_id,
                reason = ?params.reason,
                "Request cancelled"
            );
        } else {
            debug!(request_id = %params.request_id, "Cancellation for unknown request");
        }
    }

    /// Handle a single JSON-RPC request
    /// Returns None for notifications (requests without id)
    async fn handle_request(
        &self,
        request: JsonRpcRequest,
        notifier: &Notifier,
    ) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" | "notifications/initialized" => {
                debug!("Received initialized notification");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(
                self.handle_tool_call(request.id, request.params, notifier)
                    .await,
            ),
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                // For unknown methods, only respond if it's a request (has id)
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "insight-orchestrator".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");
        JsonRpcResponse::success(id, serde_json::json!({ "tools": all_tools() }))
    }

    /// Handle tools/call request
    async fn handle_tool_call(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        notifier: &Notifier,
    ) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params");
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let request_id = id.clone().unwrap_or(Value::Null);
        let (content, is_error) = match handle_tool_call(
            &self.state,
            &params.name,
            params.arguments,
            &request_id,
            notifier,
        )
        .await
        {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                    error!(error = %e, "Failed to serialize tool result");
                    format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                });
                (
                    ToolResultContent {
                        content_type: "text".to_string(),
                        text,
                    },
                    None,
                )
            }
            Err(e) => (
                ToolResultContent {
                    content_type: "text".to_string(),
                    text: format!("Error: {}", e),
                },
                Some(true),
            ),
        };

        let tool_result = ToolCallResult {
            content: vec![content],
            is_error,
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }
}

fn request_key(id: &Value) -> String {
    id.to_string()
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    match result {
        Err(e) if e.is_cancelled() => debug!("Request task cancelled"),
        Err(e) => error!(error = %e, "Request task failed"),
        Ok(()) => {}
    }
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Every tool this server exposes.
pub fn all_tools() -> Vec<Tool> {
    vec![
        get_insight_generate_tool(),
        get_insight_get_tool(),
        get_insight_list_tool(),
        get_chat_stream_tool(),
    ]
}

/// Get the insight generation tool definition
fn get_insight_generate_tool() -> Tool {
    Tool {
        name: "insight_generate".to_string(),
        description: "Generate a marketing insight. The analysis mode is derived from the prompt; the result is always well-formed and reports whether it came from the analyzer (ml) or the built-in fallback.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["segmentation", "performance", "content"],
                    "description": "Analytical surface to target"
                },
                "prompt": {
                    "type": "string",
                    "description": "Free-text analysis request"
                },
                "input_path": {
                    "type": "string",
                    "description": "Optional path of an uploaded data file"
                },
                "caller_id": {
                    "type": "string",
                    "description": "Optional id of the requesting user"
                }
            },
            "required": ["type", "prompt"],
            "additionalProperties": false
        }),
    }
}

/// Get the insight lookup tool definition
fn get_insight_get_tool() -> Tool {
    Tool {
        name: "insight_get".to_string(),
        description: "Fetch a previously generated insight by id.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Insight id"
                }
            },
            "required": ["id"],
            "additionalProperties": false
        }),
    }
}

/// Get the insight listing tool definition
fn get_insight_list_tool() -> Tool {
    Tool {
        name: "insight_list".to_string(),
        description: "List generated insights in creation order, optionally for a single caller.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "caller_id": {
                    "type": "string",
                    "description": "Only return insights created by this caller"
                }
            },
            "additionalProperties": false
        }),
    }
}

/// Get the chat streaming tool definition
fn get_chat_stream_tool() -> Tool {
    Tool {
        name: "chat_stream".to_string(),
        description: "Chat with the marketing assistant. Tokens are streamed as notifications/chat/token notifications; the final result reports the outcome and token count.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The chat message"
                },
                "context": {
                    "type": "object",
                    "description": "Optional context passed to the analyzer"
                }
            },
            "required": ["message"],
            "additionalProperties": false
        }),
    }
}
