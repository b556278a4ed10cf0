//! Content recommendation views.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::analyzer::AnalyzerOutput;

/// Maximum entries on the posting calendar.
pub const CALENDAR_DAYS: usize = 7;

/// Maximum example rows kept per format group.
pub const SAMPLES_PER_FORMAT: usize = 3;

/// One scored content row from the analyzer table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<Value>,
    #[serde(default)]
    pub persona_key: String,
    #[serde(default)]
    pub campaign_goal: String,
    pub channel: String,
    pub format: String,
    pub predicted_score: f64,
}

impl ContentRow {
    fn score(&self) -> f64 {
        if self.predicted_score.is_nan() {
            0.0
        } else {
            self.predicted_score
        }
    }
}

/// Rows of one format, accumulated in first-seen order.
#[derive(Debug, Clone)]
pub struct FormatGroup {
    pub format: String,
    pub count: usize,
    pub score_sum: f64,
    pub samples: Vec<ContentRow>,
}

impl FormatGroup {
    fn new(format: &str) -> Self {
        Self {
            format: format.to_string(),
            count: 0,
            score_sum: 0.0,
            samples: Vec::new(),
        }
    }

    fn push(&mut self, row: &ContentRow) {
        self.count += 1;
        self.score_sum += row.score();
        if self.samples.len() < SAMPLES_PER_FORMAT {
            self.samples.push(row.clone());
        }
    }

    /// Mean score across every row of the group.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.score_sum / self.count as f64
        }
    }

    /// Channel of the highest-scoring sample; the earliest wins ties.
    pub fn best_channel(&self) -> Option<&str> {
        self.samples
            .iter()
            .fold(None::<&ContentRow>, |best, row| match best {
                Some(b) if b.score() >= row.score() => Some(b),
                _ => Some(row),
            })
            .map(|row| row.channel.as_str())
    }
}

/// Extract the content table. Rows that lack a channel, format or score are skipped.
pub fn table_rows(output: &AnalyzerOutput) -> Vec<ContentRow> {
    let Some(Value::Array(table)) = output.get("table") else {
        return Vec::new();
    };

    table
        .iter()
        .filter_map(|row| match serde_json::from_value::<ContentRow>(row.clone()) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(error = %e, "Skipping malformed content row");
                None
            }
        })
        .collect()
}

fn total_items(output: &AnalyzerOutput, rows: &[ContentRow]) -> usize {
    if rows.is_empty() {
        return 0;
    }
    output
        .get("total_items")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(rows.len())
}

/// Pass the upstream selection through unchanged.
pub fn strategy_view(output: &AnalyzerOutput) -> Map<String, Value> {
    let rows = table_rows(output);
    let mut view = Map::new();
    view.insert("total_items".into(), json!(total_items(output, &rows)));
    if rows.is_empty() {
        view.insert("top_recommendations".into(), json!([]));
        view.insert("table".into(), json!([]));
        return view;
    }
    view.insert(
        "top_recommendations".into(),
        output
            .get("top_recommendations")
            .cloned()
            .unwrap_or_else(|| json!([])),
    );
    view.insert("table".into(), json!(rows));
    view
}

/// Group rows by format and order the groups by mean score.
pub fn format_groups(rows: &[ContentRow]) -> Vec<FormatGroup> {
    let mut groups: Vec<FormatGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.format.as_str()).or_insert_with(|| {
            groups.push(FormatGroup::new(&row.format));
            groups.len() - 1
        });
        groups[slot].push(row);
    }

    // stable: equal means keep first-seen order
    groups.sort_by(|a, b| b.mean().total_cmp(&a.mean()));
    groups
}

/// Per-format summary ordered by mean score.
pub fn formats_view(output: &AnalyzerOutput) -> Map<String, Value> {
    let rows = table_rows(output);
    let formats: Vec<Value> = format_groups(&rows)
        .iter()
        .map(|group| {
            let first = group.samples.first();
            json!({
                "format": group.format,
                "count": group.count,
                "avg_score": round3(group.mean()),
                "best_channel": group.best_channel(),
                "example_persona": first.map(|r| r.persona_key.as_str()),
                "example_goal": first.map(|r| r.campaign_goal.as_str()),
                "samples": group.samples,
            })
        })
        .collect();

    let mut view = Map::new();
    view.insert("total_items".into(), json!(total_items(output, &rows)));
    view.insert("formats".into(), Value::Array(formats));
    view
}

/// Greedy schedule: highest scores first, one slot per (channel, format) pair.
pub fn schedule(rows: &[ContentRow]) -> Vec<ContentRow> {
    let mut ranked: Vec<&ContentRow> = rows.iter().collect();
    ranked.sort_by(|a, b| b.score().total_cmp(&a.score()));

    let mut used: HashSet<(&str, &str)> = HashSet::new();
    let mut picked = Vec::with_capacity(CALENDAR_DAYS);
    for row in ranked {
        if picked.len() == CALENDAR_DAYS {
            break;
        }
        if used.insert((row.channel.as_str(), row.format.as_str())) {
            picked.push(row.clone());
        }
    }
    picked
}

/// Seven-day posting calendar.
pub fn calendar_view(output: &AnalyzerOutput) -> Map<String, Value> {
    let rows = table_rows(output);
    let calendar: Vec<Value> = schedule(&rows)
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut entry = Map::new();
            entry.insert("day".into(), json!(format!("Day {}", i + 1)));
            if let Ok(Value::Object(fields)) = serde_json::to_value(&row) {
                entry.extend(fields);
            }
            Value::Object(entry)
        })
        .collect();

    let mut view = Map::new();
    view.insert("total_items".into(), json!(total_items(output, &rows)));
    view.insert("calendar".into(), Value::Array(calendar));
    view
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
