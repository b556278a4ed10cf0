//! Deterministic stand-in results used when the analyzer is unavailable.
//!
//! Output is built from the prompt text and a fixed catalogue only, and has
//! the same shape as the analyzer's own output for each surface.

pub mod catalogue;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::aggregate::performance;
use crate::analyzer::AnalyzerOutput;
use crate::modes::{classify_chat, normalize, rules_for, ChatIntent, Mode, Surface};

/// Synthesize an analyzer-shaped result for `mode`.
pub fn synthesize(mode: Mode, prompt: &str) -> AnalyzerOutput {
    check_framing(mode, prompt);
    match mode.surface() {
        Surface::Segmentation => segmentation(mode),
        Surface::Performance => performance_output(mode),
        Surface::Content => content(),
    }
}

/// Log when the prompt alone would select a different mode than `mode`.
///
/// Synthesis always uses the requested mode.
pub fn check_framing(mode: Mode, prompt: &str) {
    let derived = derived_mode(mode.surface(), prompt);
    if derived != mode {
        debug!(
            requested = %mode,
            derived = %derived,
            "Fallback framing disagrees with requested mode"
        );
    }
}

fn derived_mode(surface: Surface, prompt: &str) -> Mode {
    rules_for(surface).apply(&normalize(prompt))
}

fn segmentation(mode: Mode) -> AnalyzerOutput {
    let scores = catalogue::segment_scores(mode);
    let total: u64 = catalogue::SEGMENT_PROFILES.iter().map(|p| p.count).sum();

    let mut segments: Vec<(f64, Value)> = catalogue::SEGMENT_PROFILES
        .iter()
        .zip(scores)
        .enumerate()
        .filter_map(|(cluster, (profile, score))| {
            let persona = catalogue::persona(profile.persona_key)?;
            let percentage = profile.count as f64 * 100.0 / total as f64;
            Some((
                score,
                json!({
                    "cluster": cluster,
                    "persona_key": persona.key,
                    "label": persona.label,
                    "score": score,
                    "count": profile.count,
                    "percentage": (percentage * 100.0).round() / 100.0,
                    "avg_age": profile.avg_age,
                    "avg_monthly_spend": profile.avg_monthly_spend,
                    "avg_order_value": profile.avg_order_value,
                    "avg_orders_per_month": profile.avg_orders_per_month,
                    "avg_visits_per_month": profile.avg_visits_per_month,
                    "avg_category_preference_score": profile.avg_category_preference_score,
                    "description": persona.description,
                    "recommended_channels": persona.recommended_channels,
                }),
            ))
        })
        .collect();
    segments.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut output = Map::new();
    output.insert("mode".into(), json!(mode.as_str()));
    output.insert("total_customers".into(), json!(total));
    output.insert(
        "segments".into(),
        Value::Array(segments.into_iter().map(|(_, s)| s).collect()),
    );
    output
}

fn performance_output(mode: Mode) -> AnalyzerOutput {
    let predictions: Vec<Value> = catalogue::CAMPAIGNS
        .iter()
        .map(|campaign| {
            let predicted = campaign.predicted(mode);
            json!({
                "campaign_id": campaign.campaign_id,
                "pred_score": predicted,
                "pred_roas": predicted,
                "ctr": campaign.ctr,
                "conversion_rate": campaign.conversion_rate,
                "cpc": campaign.cpc,
            })
        })
        .collect();

    let top = performance::top_campaigns(&predictions, mode);
    let recommendations = performance::recommendations(&top);

    let mut output = Map::new();
    output.insert("mode".into(), json!(mode.as_str()));
    output.insert("metric_name".into(), json!(catalogue::metric_name(mode)));
    output.insert("total_campaigns".into(), json!(predictions.len()));
    output.insert("predictions".into(), Value::Array(predictions));
    output.insert("top_campaigns".into(), Value::Array(top));
    output.insert("top_recommendations".into(), Value::Array(recommendations));
    output
}

fn content() -> AnalyzerOutput {
    let mut rows: Vec<&catalogue::ContentProfile> = catalogue::CONTENT.iter().collect();
    rows.sort_by(|a, b| b.predicted_score.total_cmp(&a.predicted_score));

    let top: Vec<Value> = rows
        .iter()
        .take(5)
        .map(|row| {
            json!({
                "persona_key": row.persona_key,
                "campaign_goal": row.campaign_goal,
                "channel": row.channel,
                "format": row.format,
                "predicted_score": row.predicted_score,
            })
        })
        .collect();
    let table: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "content_id": row.content_id,
                "persona_key": row.persona_key,
                "campaign_goal": row.campaign_goal,
                "channel": row.channel,
                "format": row.format,
                "predicted_score": row.predicted_score,
            })
        })
        .collect();

    let mut output = Map::new();
    output.insert("total_items".into(), json!(table.len()));
    output.insert("top_recommendations".into(), Value::Array(top));
    output.insert("table".into(), Value::Array(table));
    output
}

/// Canned chat reply for a message. Never empty.
pub fn chat_reply(message: &str) -> String {
    let intent = classify_chat(message);
    let reply = match intent {
        ChatIntent::General => small_talk(message),
        other => catalogue::intent_reply(other),
    };
    reply.to_string()
}

fn small_talk(message: &str) -> &'static str {
    let normalized = normalize(message);
    if let Some((_, reply)) = catalogue::SMALL_TALK_PHRASES
        .iter()
        .find(|(phrase, _)| normalized.contains(*phrase))
    {
        return *reply;
    }

    let words: Vec<&str> = normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    catalogue::SMALL_TALK
        .iter()
        .find(|(needles, _)| words.iter().any(|w| needles.contains(w)))
        .map(|(_, reply)| *reply)
        .unwrap_or(catalogue::GENERAL_REPLY)
}
