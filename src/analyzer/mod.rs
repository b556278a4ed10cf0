//! External analyzer gateway.
//!
//! The heavy numeric work is done by external analyzer processes. This
//! module owns the process edge:
//! - [`Analyzer`]: the seam the orchestrator depends on
//! - [`ProcessAnalyzer`]: spawns allow-listed interpreters with argv only
//! - [`ChatProcess`]: a running streaming analyzer and its event channel
//!
//! # Protocol
//!
//! ```text
//! batch:     <interpreter> <script> <inputPath> <mode>   → one JSON object on stdout
//! streaming: <interpreter> <chat_script> <message> [ctx] → NDJSON {token|word, done}
//! ```
//!
//! A non-zero exit is a failure regardless of stdout. Stderr is diagnostic
//! only and is logged.

mod process;
mod types;

pub use process::*;
pub use types::*;

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AnalyzerResult;
use crate::modes::Mode;

/// Gateway to the external analyzer.
///
/// One call spawns at most one process. Implementations never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Run a batch analysis for `mode` over the referenced input.
    async fn invoke(&self, mode: Mode, input: Option<PathBuf>) -> AnalyzerResult<AnalyzerOutput>;

    /// Start a streaming chat analyzer for `message`.
    async fn invoke_streaming(
        &self,
        message: String,
        context: Option<Value>,
    ) -> AnalyzerResult<ChatProcess>;
}
