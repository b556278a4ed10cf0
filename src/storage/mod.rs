//! Insight ledger.
//!
//! Insights are append-only: a [`NewInsight`] is assembled by the
//! orchestrator, adjusted through an [`InsightPatch`], and then handed to an
//! [`InsightStore`] which assigns the id and timestamp. Stored insights are
//! never modified.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageResult;
use crate::modes::{Mode, Surface};

/// Where an insight's details came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Produced by the external analyzer.
    Ml,
    /// Synthesized locally after an analyzer failure.
    #[default]
    Fallback,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Ml => write!(f, "ml"),
            Provenance::Fallback => write!(f, "fallback"),
        }
    }
}

/// A produced insight as recorded in the store.
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    /// Monotonic id assigned by the store.
    pub id: u64,
    /// Surface the insight was generated for.
    #[serde(rename = "type")]
    pub insight_type: Surface,
    /// Mode derived from the prompt.
    pub mode: Mode,
    pub title: String,
    pub prompt: String,
    /// One-line summary derived from the prompt.
    pub summary: String,
    /// Merged analyzer/fallback and aggregator output. Always an object.
    pub details: Value,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An insight that has not been appended yet.
#[derive(Debug, Clone)]
pub struct NewInsight {
    pub insight_type: Surface,
    pub mode: Mode,
    pub title: String,
    pub prompt: String,
    pub summary: String,
    pub details: Value,
    pub provenance: Provenance,
    pub caller_id: Option<String>,
}

/// The only fields that may change on a [`NewInsight`] before it is stored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsightPatch {
    #[serde(default)]
    pub provenance: Option<Provenance>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl NewInsight {
    /// Create a draft with empty object details and fallback provenance.
    pub fn new(mode: Mode, title: impl Into<String>, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            insight_type: mode.surface(),
            mode,
            title: title.into(),
            summary: summarize(&prompt),
            prompt,
            details: Value::Object(Default::default()),
            provenance: Provenance::Fallback,
            caller_id: None,
        }
    }

    /// Attach the requesting caller.
    pub fn with_caller(mut self, caller_id: Option<String>) -> Self {
        self.caller_id = caller_id;
        self
    }

    /// Apply a patch. Non-object details are wrapped so `details` stays an object.
    pub fn apply(mut self, patch: InsightPatch) -> Self {
        if let Some(provenance) = patch.provenance {
            self.provenance = provenance;
        }
        if let Some(details) = patch.details {
            self.details = match details {
                Value::Object(_) => details,
                Value::Null => Value::Object(Default::default()),
                other => serde_json::json!({ "value": other }),
            };
        }
        self
    }

    /// Finalize into a stored insight.
    pub fn into_insight(self, id: u64, created_at: DateTime<Utc>) -> Insight {
        Insight {
            id,
            insight_type: self.insight_type,
            mode: self.mode,
            title: self.title,
            prompt: self.prompt,
            summary: self.summary,
            details: self.details,
            provenance: self.provenance,
            caller_id: self.caller_id,
            created_at,
        }
    }
}

impl InsightPatch {
    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Maximum summary length in characters, before the ellipsis.
pub const SUMMARY_MAX_CHARS: usize = 80;

/// Truncate text to a one-line summary, breaking at a word boundary.
pub fn summarize(text: &str) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() <= SUMMARY_MAX_CHARS {
        return line;
    }
    let truncated: String = line.chars().take(SUMMARY_MAX_CHARS).collect();
    let boundary = truncated.rfind(' ').unwrap_or(truncated.len());
    format!("{}...", truncated[..boundary].trim_end())
}

/// Append-only insight ledger.
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Assign an id and timestamp and record the insight.
    async fn append(&self, insight: NewInsight) -> StorageResult<Insight>;

    /// Look up an insight by id.
    async fn get(&self, id: u64) -> StorageResult<Option<Insight>>;

    /// List insights in id order, optionally restricted to one caller.
    async fn list(&self, caller_id: Option<&str>) -> StorageResult<Vec<Insight>>;

    /// Number of stored insights.
    async fn count(&self) -> StorageResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summarize_short_text_unchanged() {
        assert_eq!(summarize("  Segment   my customers "), "Segment my customers");
    }

    #[test]
    fn test_summarize_breaks_at_word_boundary() {
        let prompt = "Analyze the performance of every paid social campaign we ran during the last quarter across regions";
        let summary = summarize(prompt);
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= SUMMARY_MAX_CHARS + 3);
        assert!(prompt.starts_with(summary.trim_end_matches("...")));
        assert!(!summary.trim_end_matches("...").ends_with(' '));
    }

    #[test]
    fn test_summarize_flattens_newlines() {
        assert_eq!(summarize("line one\nline two"), "line one line two");
    }

    #[test]
    fn test_new_insight_defaults() {
        let draft = NewInsight::new(Mode::Behavior, "Title", "Prompt text");
        assert_eq!(draft.insight_type, Surface::Segmentation);
        assert_eq!(draft.provenance, Provenance::Fallback);
        assert!(draft.details.is_object());
        assert_eq!(draft.summary, "Prompt text");
    }

    #[test]
    fn test_apply_patch() {
        let draft = NewInsight::new(Mode::Roi, "Title", "Prompt").apply(
            InsightPatch::default()
                .provenance(Provenance::Ml)
                .details(json!({"total_campaigns": 3})),
        );
        assert_eq!(draft.provenance, Provenance::Ml);
        assert_eq!(draft.details["total_campaigns"], 3);
    }

    #[test]
    fn test_apply_patch_keeps_details_an_object() {
        let draft = NewInsight::new(Mode::Roi, "Title", "Prompt")
            .apply(InsightPatch::default().details(Value::Null));
        assert!(draft.details.is_object());

        let draft = NewInsight::new(Mode::Roi, "Title", "Prompt")
            .apply(InsightPatch::default().details(json!([1, 2])));
        assert_eq!(draft.details, json!({"value": [1, 2]}));
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let result: Result<InsightPatch, _> =
            serde_json::from_value(json!({"provenance": "ml", "title": "hijack"}));
        assert!(result.is_err());

        let patch: InsightPatch = serde_json::from_value(json!({"provenance": "ml"})).unwrap();
        assert_eq!(patch.provenance, Some(Provenance::Ml));
        assert!(patch.details.is_none());
    }

    #[test]
    fn test_insight_serializes_type_field() {
        let insight = NewInsight::new(Mode::Calendar, "Content Plan", "plan")
            .into_insight(7, Utc::now());
        let json = serde_json::to_value(&insight).unwrap();
        assert_eq!(json["type"], "content");
        assert_eq!(json["mode"], "calendar");
        assert_eq!(json["provenance"], "fallback");
        assert!(json.get("caller_id").is_none());
    }
}
