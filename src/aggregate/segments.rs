use serde_json::{json, Map, Value};

use crate::analyzer::AnalyzerOutput;
use crate::fallback::catalogue;

/// Order segments by persona score and attach playbook details.
pub fn segment_view(output: &AnalyzerOutput) -> Map<String, Value> {
    let mut segments: Vec<Value> = match output.get("segments") {
        Some(Value::Array(segments)) => segments.clone(),
        _ => Vec::new(),
    };

    segments.sort_by(|a, b| score(b).total_cmp(&score(a)));
    for segment in &mut segments {
        enrich(segment);
    }

    let total_customers = output
        .get("total_customers")
        .cloned()
        .unwrap_or_else(|| json!(segments.iter().filter_map(|s| s["count"].as_u64()).sum::<u64>()));

    let mut view = Map::new();
    view.insert("total_customers".into(), total_customers);
    view.insert("segments".into(), Value::Array(segments));
    view
}

fn score(segment: &Value) -> f64 {
    segment
        .get("score")
        .and_then(Value::as_f64)
        .filter(|s| !s.is_nan())
        .unwrap_or(0.0)
}

fn enrich(segment: &mut Value) {
    let Value::Object(fields) = segment else {
        return;
    };
    let Some(persona) = fields
        .get("persona_key")
        .and_then(Value::as_str)
        .and_then(catalogue::persona)
    else {
        return;
    };

    fields
        .entry("label")
        .or_insert_with(|| json!(persona.label));
    fields
        .entry("description")
        .or_insert_with(|| json!(persona.description));
    fields
        .entry("recommended_channels")
        .or_insert_with(|| json!(persona.recommended_channels));
}
