//! Unit tests for the JSON-RPC server.
//!
//! Tests request/response handling, tool definitions, streamed chat
//! notifications and type serialization.

use super::*;
use crate::analyzer::{ChatProcess, MockAnalyzer, StreamEvent};
use crate::config::{Config, StreamingConfig};
use crate::error::AnalyzerError;
use crate::orchestrator::Orchestrator;
use crate::server::{AppState, CHAT_TOKEN_METHOD};
use crate::storage::MemoryStore;
use crate::streaming::ChatDispatcher;
use serde_json::json;
use std::collections::HashSet;
use tokio::io::AsyncReadExt;

// ============================================================================
// Helpers
// ============================================================================

fn server_with(analyzer: MockAnalyzer) -> McpServer {
    let orchestrator = Orchestrator::new(
        Arc::new(analyzer),
        Arc::new(MemoryStore::new()),
        ChatDispatcher::new(&StreamingConfig {
            fallback_pacing_ms: 1,
            channel_capacity: 8,
        }),
    );
    McpServer::new(Arc::new(AppState::with_orchestrator(
        Config::default(),
        orchestrator,
    )))
}

fn failing_analyzer() -> MockAnalyzer {
    let mut analyzer = MockAnalyzer::new();
    analyzer
        .expect_invoke()
        .returning(|_, _| Err(AnalyzerError::NoInput));
    analyzer.expect_invoke_streaming().returning(|_, _| {
        Err(AnalyzerError::ProcessSpawnFailure {
            command: "python3".to_string(),
            message: "executable not found".to_string(),
        })
    });
    analyzer
}

/// Feed `requests` as stdin lines and return every line written to stdout.
async fn exchange(server: &McpServer, requests: &[Value]) -> Vec<Value> {
    let input: String = requests
        .iter()
        .map(|r| format!("{}\n", r))
        .collect();
    let (writer, mut reader) = tokio::io::duplex(1 << 20);

    server.serve(input.as_bytes(), writer).await.unwrap();

    let mut output = String::new();
    reader.read_to_string(&mut output).await.unwrap();
    output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn tool_text(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// ============================================================================
// JsonRpcResponse tests
// ============================================================================

#[test]
fn test_jsonrpc_response_success_with_id() {
    let response = JsonRpcResponse::success(Some(json!(1)), json!({"result": "ok"}));

    assert_eq!(response.jsonrpc, "2.0");
    assert_eq!(response.id, json!(1));
    assert!(response.error.is_none());
    assert_eq!(response.result.unwrap()["result"], "ok");
}

#[test]
fn test_jsonrpc_response_success_without_id() {
    let response = JsonRpcResponse::success(None, json!({"data": "value"}));

    assert_eq!(response.id, Value::Null);
    assert!(response.result.is_some());
}

#[test]
fn test_jsonrpc_response_error_with_id() {
    let response = JsonRpcResponse::error(Some(json!(42)), -32600, "Invalid request");

    assert_eq!(response.id, json!(42));
    assert!(response.result.is_none());

    let error = response.error.unwrap();
    assert_eq!(error.code, -32600);
    assert_eq!(error.message, "Invalid request");
}

#[test]
fn test_jsonrpc_response_serialization() {
    let response = JsonRpcResponse::success(Some(json!(1)), json!({"test": true}));
    let serialized = serde_json::to_string(&response).unwrap();

    assert!(serialized.contains("\"jsonrpc\":\"2.0\""));
    assert!(serialized.contains("\"id\":1"));
    // Error should be omitted when None
    assert!(!serialized.contains("\"error\""));
}

#[test]
fn test_jsonrpc_notification_no_id() {
    let request: JsonRpcRequest =
        serde_json::from_value(json!({"jsonrpc": "2.0", "method": "initialized"})).unwrap();
    assert!(request.id.is_none());
    assert!(request.params.is_none());
}

#[test]
fn test_cancel_params_deserialization() {
    let params: CancelParams =
        serde_json::from_value(json!({"requestId": "abc", "reason": "user"})).unwrap();
    assert_eq!(params.request_id, json!("abc"));
    assert_eq!(params.reason.as_deref(), Some("user"));
}

// ============================================================================
// Tool definition tests
// ============================================================================

#[test]
fn test_all_tools_count() {
    assert_eq!(all_tools().len(), 4);
}

#[test]
fn test_tool_names_are_unique() {
    let names: HashSet<String> = all_tools().into_iter().map(|t| t.name).collect();
    assert_eq!(names.len(), 4);
    for name in ["insight_generate", "insight_get", "insight_list", "chat_stream"] {
        assert!(names.contains(name), "missing {name}");
    }
}

#[test]
fn test_all_tools_have_valid_schemas() {
    for tool in all_tools() {
        assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
        assert!(tool.input_schema["properties"].is_object(), "{}", tool.name);
        assert!(!tool.description.is_empty());
    }
}

#[test]
fn test_insight_generate_schema_requires_type_and_prompt() {
    let tool = all_tools()
        .into_iter()
        .find(|t| t.name == "insight_generate")
        .unwrap();
    assert_eq!(tool.input_schema["required"], json!(["type", "prompt"]));
}

#[test]
fn test_tool_serialization() {
    let serialized = serde_json::to_value(&all_tools()[0]).unwrap();
    assert!(serialized.get("inputSchema").is_some());
    assert!(serialized.get("input_schema").is_none());
}

// ============================================================================
// Server exchange tests
// ============================================================================

#[tokio::test]
async fn test_initialize_and_ping() {
    let server = server_with(MockAnalyzer::new());
    let lines = exchange(
        &server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
        ],
    )
    .await;

    assert_eq!(lines.len(), 2);
    let init = lines.iter().find(|l| l["id"] == 1).unwrap();
    assert_eq!(init["result"]["serverInfo"]["name"], "insight-orchestrator");
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
    let ping = lines.iter().find(|l| l["id"] == 2).unwrap();
    assert_eq!(ping["result"], json!({}));
}

#[tokio::test]
async fn test_tools_list() {
    let server = server_with(MockAnalyzer::new());
    let lines = exchange(
        &server,
        &[json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})],
    )
    .await;
    assert_eq!(lines[0]["result"]["tools"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_unknown_method_and_parse_error() {
    let server = server_with(MockAnalyzer::new());
    let (writer, mut reader) = tokio::io::duplex(1 << 16);
    server
        .serve(
            "not json\n{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"nope\"}\n".as_bytes(),
            writer,
        )
        .await
        .unwrap();

    let mut output = String::new();
    reader.read_to_string(&mut output).await.unwrap();
    let lines: Vec<Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l["error"]["code"] == -32700));
    let unknown = lines.iter().find(|l| l["id"] == 9).unwrap();
    assert_eq!(unknown["error"]["code"], -32601);
}

#[tokio::test]
async fn test_insight_generate_round_trip() {
    let server = server_with(failing_analyzer());
    let lines = exchange(
        &server,
        &[json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "insight_generate",
                "arguments": {
                    "type": "segmentation",
                    "prompt": "Segment customers based on purchasing behavior patterns."
                }
            }
        })],
    )
    .await;

    let insight = tool_text(&lines[0]);
    assert_eq!(insight["id"], 1);
    assert_eq!(insight["type"], "segmentation");
    assert_eq!(insight["mode"], "behavior");
    assert_eq!(insight["provenance"], "fallback");
    assert_eq!(insight["details"]["segments"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_insight_generate_validation_error() {
    let server = server_with(failing_analyzer());
    let lines = exchange(
        &server,
        &[json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "insight_generate", "arguments": {"type": "content", "prompt": " "}}
        })],
    )
    .await;

    assert_eq!(lines[0]["result"]["isError"], true);
    let text = lines[0]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("prompt"));
    assert!(text.contains("Invalid request"));
    assert!(!text.contains("Internal"));
}

#[tokio::test]
async fn test_unknown_tool_is_error_result() {
    let server = server_with(MockAnalyzer::new());
    let lines = exchange(
        &server,
        &[json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "forecast_revenue", "arguments": {}}
        })],
    )
    .await;
    assert_eq!(lines[0]["result"]["isError"], true);
}

#[tokio::test]
async fn test_insight_list_without_arguments() {
    let server = server_with(failing_analyzer());
    let lines = exchange(
        &server,
        &[json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "insight_list"}
        })],
    )
    .await;
    let listing = tool_text(&lines[0]);
    assert_eq!(listing["count"], 0);
}

#[tokio::test]
async fn test_chat_stream_notifications_precede_response() {
    let mut analyzer = MockAnalyzer::new();
    analyzer.expect_invoke_streaming().returning(|_, _| {
        Ok(ChatProcess::from_events(
            vec![
                StreamEvent::Token("Hello".to_string()),
                StreamEvent::Token(" there".to_string()),
                StreamEvent::Done,
            ],
            0,
        ))
    });
    let server = server_with(analyzer);

    let lines = exchange(
        &server,
        &[json!({
            "jsonrpc": "2.0",
            "id": "chat-1",
            "method": "tools/call",
            "params": {"name": "chat_stream", "arguments": {"message": "hello"}}
        })],
    )
    .await;

    assert_eq!(lines.len(), 4);
    for line in &lines[..3] {
        assert_eq!(line["method"], CHAT_TOKEN_METHOD);
        assert_eq!(line["params"]["requestId"], "chat-1");
    }
    assert_eq!(lines[0]["params"]["text"], "Hello");
    assert_eq!(lines[2]["params"]["done"], true);

    let result = tool_text(&lines[3]);
    assert_eq!(result["outcome"], "analyzer");
    assert_eq!(result["tokens"], 2);
}

#[tokio::test]
async fn test_chat_stream_falls_back_when_spawn_fails() {
    let server = server_with(failing_analyzer());
    let lines = exchange(
        &server,
        &[json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "chat_stream", "arguments": {"message": "thanks"}}
        })],
    )
    .await;

    let terminals = lines
        .iter()
        .filter(|l| l["method"] == CHAT_TOKEN_METHOD && l["params"]["done"] == true)
        .count();
    assert_eq!(terminals, 1);

    let result = tool_text(lines.last().unwrap());
    assert_eq!(result["outcome"], "fallback");
    assert_eq!(
        result["tokens"],
        crate::fallback::chat_reply("thanks").split_whitespace().count()
    );
}

#[tokio::test]
async fn test_cancel_unknown_request_is_silent() {
    let server = server_with(MockAnalyzer::new());
    let lines = exchange(
        &server,
        &[json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"requestId": 77}
        })],
    )
    .await;
    assert!(lines.is_empty());
    assert!(!server.cancel_request(&json!(77)));
}

#[tokio::test]
async fn test_duplicate_request_id_stays_cancellable() {
    let server = server_with(MockAnalyzer::new());
    let key = request_key(&json!(5));
    let mut tasks = JoinSet::new();
    let first = tasks.spawn(std::future::pending::<()>());
    let second = tasks.spawn(std::future::pending::<()>());

    register(&mut server.lock_inflight(), key.clone(), 0, first.clone());
    register(&mut server.lock_inflight(), key.clone(), 1, second.clone());

    // the first request finishing must not drop the second one's entry
    server.deregister(&key, 0);
    assert!(server.lock_inflight().contains_key(&key));

    assert!(server.cancel_request(&json!(5)));
    let err = tasks.join_next().await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(second.is_finished());
    assert!(!first.is_finished());

    assert!(!server.cancel_request(&json!(5)));
    tasks.abort_all();
}

#[tokio::test]
async fn test_deregister_removes_owned_entry() {
    let server = server_with(MockAnalyzer::new());
    let key = request_key(&json!("req-1"));
    let mut tasks = JoinSet::new();
    let handle = tasks.spawn(std::future::pending::<()>());

    register(&mut server.lock_inflight(), key.clone(), 3, handle);
    server.deregister(&key, 2);
    assert!(server.lock_inflight().contains_key(&key));
    server.deregister(&key, 3);
    assert!(!server.lock_inflight().contains_key(&key));

    tasks.abort_all();
}
