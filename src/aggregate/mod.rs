//! Mode-specific post-processing of analyzer output.
//!
//! Each mode maps to one view. The view's keys are overlaid on the analyzer
//! output to form an insight's `details`; view keys win on conflict, and
//! `mode` and `view` are always set.

pub mod content;
pub mod performance;
pub mod segments;

use serde_json::{json, Map, Value};

use crate::analyzer::AnalyzerOutput;
use crate::modes::Mode;

/// Name of the view a mode renders.
pub fn view_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Behavior | Mode::Campaign | Mode::SegmentEngagement => "segments",
        Mode::Roi | Mode::Conversion | Mode::PerformanceEngagement => "ranking",
        Mode::Strategy => "strategy",
        Mode::Formats => "formats",
        Mode::Calendar => "calendar",
    }
}

/// Build the view for `mode`.
pub fn view(mode: Mode, output: &AnalyzerOutput) -> Map<String, Value> {
    match mode {
        Mode::Behavior | Mode::Campaign | Mode::SegmentEngagement => {
            segments::segment_view(output)
        }
        Mode::Roi | Mode::Conversion | Mode::PerformanceEngagement => {
            performance::ranking_view(mode, output)
        }
        Mode::Strategy => content::strategy_view(output),
        Mode::Formats => content::formats_view(output),
        Mode::Calendar => content::calendar_view(output),
    }
}

/// Merge analyzer output with its view into insight details.
pub fn aggregate(mode: Mode, output: AnalyzerOutput) -> Value {
    let view = view(mode, &output);
    let mut merged = output;
    merged.extend(view);
    merged.insert("mode".into(), json!(mode.as_str()));
    merged.insert("view".into(), json!(view_name(mode)));
    Value::Object(merged)
}
