//! One-shot command line operations.
//!
//! `insight` and `chat` run a single request through the same orchestrator
//! the server uses and print the result to stdout.

use std::io::Write;
use std::path::PathBuf;

use clap::Subcommand;
use serde_json::Value;

use crate::modes::Surface;
use crate::orchestrator::InsightRequest;
use crate::server::AppState;

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve JSON-RPC requests over stdio (default)
    Serve,

    /// Generate one insight and print it as JSON
    Insight {
        /// Analytical surface: segmentation, performance or content
        #[arg(long = "type", value_parser = parse_surface)]
        insight_type: Surface,

        /// Free-text analysis request
        #[arg(long)]
        prompt: String,

        /// Path of the data file to analyze
        #[arg(long)]
        input: Option<PathBuf>,

        /// Id of the requesting user
        #[arg(long)]
        caller: Option<String>,
    },

    /// Send one chat message and print tokens as they arrive
    Chat {
        /// The chat message
        message: String,

        /// Context JSON passed to the analyzer
        #[arg(long, value_parser = parse_context)]
        context: Option<Value>,
    },
}

fn parse_surface(s: &str) -> Result<Surface, String> {
    s.parse()
}

fn parse_context(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid context JSON: {}", e))
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a one-shot command. `Serve` is handled by the binary.
pub async fn execute_command(command: Commands, state: &AppState) -> CliResult {
    match command {
        Commands::Serve => CliResult::error("serve is not a one-shot command"),
        Commands::Insight {
            insight_type,
            prompt,
            input,
            caller,
        } => {
            let request = InsightRequest {
                insight_type,
                prompt,
                input_path: input,
                caller_id: caller,
            };
            execute_insight(state, request).await
        }
        Commands::Chat { message, context } => {
            execute_chat(state, &message, context, &mut std::io::stdout()).await
        }
    }
}

async fn execute_insight(state: &AppState, request: InsightRequest) -> CliResult {
    match state.orchestrator.generate_insight(request).await {
        Ok(insight) => match serde_json::to_string_pretty(&insight) {
            Ok(json) => CliResult::success(json),
            Err(e) => CliResult::error(format!("Failed to serialize insight: {}", e)),
        },
        Err(e) => CliResult::error(format!("Error: {}", e)),
    }
}

/// Stream a chat reply into `out`, returning the outcome summary.
pub async fn execute_chat<W: Write>(
    state: &AppState,
    message: &str,
    context: Option<Value>,
    out: &mut W,
) -> CliResult {
    let mut stream = match state.orchestrator.stream_chat(message, context).await {
        Ok(stream) => stream,
        Err(e) => return CliResult::error(format!("Error: {}", e)),
    };

    while let Some(token) = stream.next().await {
        if token.done {
            break;
        }
        if write!(out, "{}", token.text).and_then(|_| out.flush()).is_err() {
            stream.cancel();
            break;
        }
    }
    let _ = writeln!(out);

    let outcome = stream.outcome().await;
    CliResult::success(format!(
        "[{} tokens, {}]",
        outcome.tokens,
        serde_json::to_value(outcome.outcome)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    ))
}
