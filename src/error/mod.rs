use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ToolError),
}

/// Insight store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Insight not found: {id}")]
    InsightNotFound { id: u64 },
}

/// Failures reported by the external analyzer gateway.
///
/// None of these reach a caller of the orchestrator: every variant is
/// converted into a fallback-provenance result at that boundary.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("No input reference supplied; analyzer not started")]
    NoInput,

    #[error("Input not found: {}", path.display())]
    InputMissing { path: PathBuf },

    #[error("Failed to start analyzer '{command}': {message}")]
    ProcessSpawnFailure { command: String, message: String },

    #[error("Analyzer exited with status {status}: {stderr}")]
    ProcessFailure { status: i32, stderr: String },

    #[error("Analyzer output could not be parsed: {message}")]
    ParseFailure { message: String },

    #[error("Analyzer reported an error: {message}")]
    Reported { message: String },

    #[error("Analyzer timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl AnalyzerError {
    /// Short machine-readable tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzerError::NoInput => "no_input",
            AnalyzerError::InputMissing { .. } => "input_missing",
            AnalyzerError::ProcessSpawnFailure { .. } => "process_spawn_failure",
            AnalyzerError::ProcessFailure { .. } => "process_failure",
            AnalyzerError::ParseFailure { .. } => "parse_failure",
            AnalyzerError::Reported { .. } => "reported",
            AnalyzerError::Timeout { .. } => "timeout",
        }
    }
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tool-specific errors with structured details
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for analyzer gateway operations
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
