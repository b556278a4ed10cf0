use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{Notifier, SharedState};
use crate::error::{McpError, McpResult};
use crate::orchestrator::InsightRequest;

/// Method name of streamed chat token notifications.
pub const CHAT_TOKEN_METHOD: &str = "notifications/chat/token";

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
    request_id: &Value,
    notifier: &Notifier,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        "insight_generate" => handle_insight_generate(state, arguments).await,
        "insight_get" => handle_insight_get(state, arguments).await,
        "insight_list" => handle_insight_list(state, arguments).await,
        "chat_stream" => handle_chat_stream(state, arguments, request_id, notifier).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

/// Handle insight_generate tool call
async fn handle_insight_generate(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("insight_generate", arguments, |request: InsightRequest| {
        state.orchestrator.generate_insight(request)
    })
    .await
}

/// Handle insight_get - fetch one stored insight
async fn handle_insight_get(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct GetParams {
        id: u64,
    }

    execute_handler("insight_get", arguments, |params: GetParams| {
        state.orchestrator.get_insight(params.id)
    })
    .await
}

/// Handle insight_list - list stored insights, optionally per caller
async fn handle_insight_list(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize, Default)]
    struct ListParams {
        #[serde(default)]
        caller_id: Option<String>,
    }

    // arguments are optional for a plain listing
    let params: ListParams = match arguments {
        Some(args) => parse_arguments("insight_list", Some(args))?,
        None => ListParams::default(),
    };

    let insights = state
        .orchestrator
        .list_insights(params.caller_id.as_deref())
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    Ok(json!({
        "count": insights.len(),
        "insights": insights,
    }))
}

#[derive(Debug, Deserialize)]
struct ChatParams {
    message: String,
    #[serde(default)]
    context: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ChatTokenNotification<'a> {
    #[serde(rename = "requestId")]
    request_id: &'a Value,
    text: String,
    done: bool,
}

/// Handle chat_stream - relay tokens as notifications, then report the outcome
async fn handle_chat_stream(
    state: &SharedState,
    arguments: Option<Value>,
    request_id: &Value,
    notifier: &Notifier,
) -> McpResult<Value> {
    let params: ChatParams = parse_arguments("chat_stream", arguments)?;

    let mut stream = state
        .orchestrator
        .stream_chat(&params.message, params.context)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;
    let session_id = stream.session_id();

    while let Some(token) = stream.next().await {
        let notification = ChatTokenNotification {
            request_id,
            text: token.text,
            done: token.done,
        };
        if let Err(e) = notifier
            .notify(CHAT_TOKEN_METHOD, serde_json::to_value(&notification)?)
            .await
        {
            warn!(session_id = %session_id, error = %e, "Token delivery failed, cancelling session");
            stream.cancel();
            break;
        }
    }

    let outcome = stream.outcome().await;
    Ok(json!({
        "session_id": session_id,
        "outcome": outcome.outcome,
        "tokens": outcome.tokens,
    }))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Parse typed arguments, run the operation, and serialize its result.
async fn execute_handler<P, R, E, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    E: std::fmt::Display,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;

    let result = operation(params)
        .await
        .map_err(|e| McpError::ExecutionFailed {
            message: e.to_string(),
        })?;

    serde_json::to_value(result).map_err(McpError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments_missing() {
        let result: McpResult<ChatParams> = parse_arguments("chat_stream", None);
        match result {
            Err(McpError::InvalidParameters { tool_name, message }) => {
                assert_eq!(tool_name, "chat_stream");
                assert_eq!(message, "Missing arguments");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_arguments_wrong_shape() {
        let result: McpResult<InsightRequest> = parse_arguments(
            "insight_generate",
            Some(json!({"type": "weather", "prompt": "x"})),
        );
        assert!(matches!(result, Err(McpError::InvalidParameters { .. })));
    }

    #[test]
    fn test_token_notification_shape() {
        let id = json!(7);
        let notification = ChatTokenNotification {
            request_id: &id,
            text: "Hi".to_string(),
            done: false,
        };
        assert_eq!(
            serde_json::to_value(&notification).unwrap(),
            json!({"requestId": 7, "text": "Hi", "done": false})
        );
    }
}
