use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AnalyzerError, AnalyzerResult};

/// Structured analyzer payload. Its shape depends on the mode.
pub type AnalyzerOutput = Map<String, Value>;

/// One event from a streaming analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment to relay.
    Token(String),
    /// End-of-stream marker.
    Done,
}

/// Wire form of a streaming event line.
#[derive(Debug, Deserialize)]
struct RawStreamEvent {
    #[serde(default, alias = "word")]
    token: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Parse one stdout line from a streaming analyzer.
///
/// Blank lines yield no events. A line carrying both a token and
/// `done: true` yields the token followed by the terminal marker.
pub fn parse_stream_line(line: &str) -> Result<Vec<StreamEvent>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let raw: RawStreamEvent =
        serde_json::from_str(trimmed).map_err(|e| format!("invalid event JSON: {}", e))?;

    let mut events = Vec::with_capacity(2);
    if let Some(token) = raw.token {
        events.push(StreamEvent::Token(token));
    }
    if raw.done {
        events.push(StreamEvent::Done);
    }

    if events.is_empty() {
        return Err(format!(
            "event has neither token nor terminal marker: '{}'",
            trimmed.chars().take(100).collect::<String>()
        ));
    }
    Ok(events)
}

/// Parse the stdout buffer of a successful batch run.
///
/// The buffer must hold exactly one JSON object. An object carrying a
/// string `error` field is the analyzer's own failure report.
pub fn parse_batch_output(stdout: &[u8]) -> AnalyzerResult<AnalyzerOutput> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnalyzerError::ParseFailure {
            message: "analyzer produced no output".to_string(),
        });
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| AnalyzerError::ParseFailure {
        message: format!(
            "{} (first 100 chars: '{}')",
            e,
            trimmed.chars().take(100).collect::<String>()
        ),
    })?;

    match value {
        Value::Object(map) => {
            if let Some(Value::String(message)) = map.get("error") {
                return Err(AnalyzerError::Reported {
                    message: message.clone(),
                });
            }
            Ok(map)
        }
        other => Err(AnalyzerError::ParseFailure {
            message: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_event() {
        let events = parse_stream_line(r#"{"token": "Hello", "done": false}"#).unwrap();
        assert_eq!(events, vec![StreamEvent::Token("Hello".to_string())]);
    }

    #[test]
    fn test_parse_word_alias() {
        let events = parse_stream_line(r#"{"word": "Hi"}"#).unwrap();
        assert_eq!(events, vec![StreamEvent::Token("Hi".to_string())]);
    }

    #[test]
    fn test_parse_done_event() {
        let events = parse_stream_line(r#"{"done": true}"#).unwrap();
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_parse_token_with_done() {
        let events = parse_stream_line(r#"{"token": "bye", "done": true}"#).unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::Token("bye".to_string()), StreamEvent::Done]
        );
    }

    #[test]
    fn test_parse_blank_line() {
        assert!(parse_stream_line("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_lines() {
        assert!(parse_stream_line("not json").is_err());
        assert!(parse_stream_line(r#"{"error": "No message provided"}"#).is_err());
        assert!(parse_stream_line(r#"{"done": false}"#).is_err());
    }

    #[test]
    fn test_batch_output_object() {
        let output =
            parse_batch_output(br#"  {"mode": "behavior", "total_customers": 0, "segments": []}"#)
                .unwrap();
        assert_eq!(output["mode"], "behavior");
    }

    #[test]
    fn test_batch_output_pretty_printed() {
        let output = parse_batch_output(b"{\n  \"total_items\": 2,\n  \"table\": []\n}\n").unwrap();
        assert_eq!(output["total_items"], 2);
    }

    #[test]
    fn test_batch_output_empty() {
        let err = parse_batch_output(b"\n").unwrap_err();
        assert!(matches!(err, AnalyzerError::ParseFailure { .. }));
    }

    #[test]
    fn test_batch_output_malformed() {
        let err = parse_batch_output(b"Traceback (most recent call last)").unwrap_err();
        assert!(matches!(err, AnalyzerError::ParseFailure { .. }));
    }

    #[test]
    fn test_batch_output_non_object() {
        let err = parse_batch_output(b"[1, 2, 3]").unwrap_err();
        match err {
            AnalyzerError::ParseFailure { message } => assert!(message.contains("array")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_batch_output_reported_error() {
        let err = parse_batch_output(
            br#"{"error": "Missing columns: avg_roas", "solution": "retrain"}"#,
        )
        .unwrap_err();
        match err {
            AnalyzerError::Reported { message } => assert_eq!(message, "Missing columns: avg_roas"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
