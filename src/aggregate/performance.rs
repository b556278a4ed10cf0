use serde_json::{json, Map, Value};

use crate::analyzer::AnalyzerOutput;
use crate::modes::Mode;

/// Number of campaigns kept in the ranking.
pub const TOP_CAMPAIGNS: usize = 5;

/// Suggestion attached to each ranked campaign.
pub const PRIORITISE_SUGGESTION: &str =
    "Prioritise this campaign based on the selected performance mode.";

/// Prediction field a performance mode ranks by.
pub fn rank_key(mode: Mode) -> &'static str {
    match mode {
        Mode::PerformanceEngagement => "ctr",
        Mode::Conversion => "conversion_rate",
        _ => "pred_score",
    }
}

/// Top campaigns by the mode's key, highest first. Ties keep input order.
pub fn top_campaigns(predictions: &[Value], mode: Mode) -> Vec<Value> {
    let key = rank_key(mode);
    let metric = |row: &Value| {
        row.get(key)
            .and_then(Value::as_f64)
            .filter(|v| !v.is_nan())
            .unwrap_or(0.0)
    };

    let mut ranked: Vec<&Value> = predictions.iter().collect();
    ranked.sort_by(|a, b| metric(b).total_cmp(&metric(a)));
    ranked.into_iter().take(TOP_CAMPAIGNS).cloned().collect()
}

/// One recommendation per ranked campaign.
pub fn recommendations(top: &[Value]) -> Vec<Value> {
    top.iter()
        .map(|campaign| {
            json!({
                "campaign_id": campaign.get("campaign_id").cloned().unwrap_or(Value::Null),
                "pred_roas": campaign
                    .get("pred_roas")
                    .or_else(|| campaign.get("pred_score"))
                    .cloned()
                    .unwrap_or(Value::Null),
                "suggestion": PRIORITISE_SUGGESTION,
            })
        })
        .collect()
}

/// Fill in the ranking when the analyzer did not supply one.
pub fn ranking_view(mode: Mode, output: &AnalyzerOutput) -> Map<String, Value> {
    let predictions: &[Value] = match output.get("predictions") {
        Some(Value::Array(rows)) => rows,
        _ => &[],
    };

    let top = match output.get("top_campaigns") {
        Some(Value::Array(top)) => top.clone(),
        _ => top_campaigns(predictions, mode),
    };
    let recs = match output.get("top_recommendations") {
        Some(Value::Array(recs)) => recs.clone(),
        _ => recommendations(&top),
    };

    let mut view = Map::new();
    view.insert("rank_by".into(), json!(rank_key(mode)));
    view.insert(
        "total_campaigns".into(),
        output
            .get("total_campaigns")
            .cloned()
            .unwrap_or_else(|| json!(predictions.len())),
    );
    view.insert("top_campaigns".into(), Value::Array(top));
    view.insert("top_recommendations".into(), Value::Array(recs));
    view
}
