//! Request orchestration.
//!
//! [`Orchestrator`] owns the two total operations: batch insight generation
//! and chat streaming. Analyzer failures never reach the caller; they turn
//! into fallback-provenance results here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::aggregate;
use crate::analyzer::Analyzer;
use crate::error::{AppResult, StorageError, ToolError};
use crate::fallback;
use crate::modes::{classify, Mode, Surface};
use crate::storage::{Insight, InsightPatch, InsightStore, NewInsight, Provenance};
use crate::streaming::{ChatDispatcher, ChatStream};

/// A batch analysis request. The mode is always derived from the prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct InsightRequest {
    #[serde(rename = "type")]
    pub insight_type: Surface,
    pub prompt: String,
    #[serde(default)]
    pub input_path: Option<PathBuf>,
    #[serde(default)]
    pub caller_id: Option<String>,
}

impl InsightRequest {
    pub fn new(insight_type: Surface, prompt: impl Into<String>) -> Self {
        Self {
            insight_type,
            prompt: prompt.into(),
            input_path: None,
            caller_id: None,
        }
    }

    pub fn with_input(mut self, input_path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(input_path.into());
        self
    }

    pub fn with_caller(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }
}

/// Fixed title for a mode.
pub fn title(mode: Mode) -> String {
    let surface = match mode.surface() {
        Surface::Segmentation => "Customer Segmentation",
        Surface::Performance => "Campaign Performance",
        Surface::Content => "Content Recommendations",
    };
    format!("{} — {}", surface, mode.label())
}

/// Wires the classifier, analyzer, fallback, aggregator and store together.
#[derive(Clone)]
pub struct Orchestrator {
    analyzer: Arc<dyn Analyzer>,
    store: Arc<dyn InsightStore>,
    dispatcher: ChatDispatcher,
}

impl Orchestrator {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        store: Arc<dyn InsightStore>,
        dispatcher: ChatDispatcher,
    ) -> Self {
        Self {
            analyzer,
            store,
            dispatcher,
        }
    }

    /// Produce and record an insight.
    ///
    /// Fails only on an empty prompt or a store error. Any analyzer failure
    /// yields a fallback result instead.
    pub async fn generate_insight(&self, request: InsightRequest) -> AppResult<Insight> {
        if request.prompt.trim().is_empty() {
            return Err(ToolError::Validation {
                field: "prompt".to_string(),
                reason: "cannot be empty".to_string(),
            }
            .into());
        }

        let start = Instant::now();
        let mode = classify(&request.prompt, request.insight_type);

        let (output, provenance) = match self
            .analyzer
            .invoke(mode, request.input_path.clone())
            .await
        {
            Ok(output) => (output, Provenance::Ml),
            Err(e) => {
                warn!(
                    mode = %mode,
                    error = %e,
                    kind = e.kind(),
                    "Analyzer failed, using fallback"
                );
                (fallback::synthesize(mode, &request.prompt), Provenance::Fallback)
            }
        };

        let revalidated = classify(&request.prompt, request.insight_type);
        if revalidated != mode {
            warn!(
                mode = %mode,
                revalidated = %revalidated,
                "Classification changed between calls; keeping the first"
            );
        }

        let details = aggregate::aggregate(mode, output);
        let draft = NewInsight::new(mode, title(mode), request.prompt)
            .with_caller(request.caller_id)
            .apply(
                InsightPatch::default()
                    .provenance(provenance)
                    .details(details),
            );

        let insight = self.store.append(draft).await?;

        info!(
            insight_id = insight.id,
            surface = %insight.insight_type,
            mode = %insight.mode,
            provenance = %insight.provenance,
            latency_ms = start.elapsed().as_millis(),
            "Insight generated"
        );

        Ok(insight)
    }

    /// Start a chat session. Fails only on an empty message.
    pub async fn stream_chat(&self, message: &str, context: Option<Value>) -> AppResult<ChatStream> {
        if message.trim().is_empty() {
            return Err(ToolError::Validation {
                field: "message".to_string(),
                reason: "cannot be empty".to_string(),
            }
            .into());
        }

        let source = self
            .analyzer
            .invoke_streaming(message.to_string(), context)
            .await;
        let stream = self.dispatcher.start(source, fallback::chat_reply(message));

        info!(session_id = %stream.session_id(), "Chat session started");
        Ok(stream)
    }

    /// Fetch a stored insight.
    pub async fn get_insight(&self, id: u64) -> AppResult<Insight> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StorageError::InsightNotFound { id }.into())
    }

    /// List stored insights, optionally for one caller.
    pub async fn list_insights(&self, caller_id: Option<&str>) -> AppResult<Vec<Insight>> {
        Ok(self.store.list(caller_id).await?)
    }
}
