use crate::parser::traits::*;
use crate::parser::{check_line_size, MAX_LINE_SIZE};
use serde_json::{Map, Value};

/// Lines up to this size are fully decoded during detection (1KB)
const MAX_DETECTION_SIZE: usize = 1024;

/// JSON format detector
pub struct JsonDetector;

impl FormatDetector for JsonDetector {
    fn detect(&self, sample: &str) -> DetectionResult {
        if sample.len() > MAX_LINE_SIZE {
            return DetectionResult::no_match();
        }

        let trimmed = sample.trim();
        if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
            return DetectionResult::no_match();
        }

        // Small lines are parsed fully; large ones only get the structural check.
        if trimmed.len() <= MAX_DETECTION_SIZE {
            return match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(_)) => DetectionResult::new(LogFormat::Json, 0.99),
                _ => DetectionResult::no_match(),
            };
        }

        DetectionResult::new(LogFormat::Json, 0.8)
    }

    fn format(&self) -> LogFormat {
        LogFormat::Json
    }
}

/// JSON parser
pub struct JsonParser;

impl LogParser for JsonParser {
    fn parse(&self, raw: &str) -> Result<ParsedRecord, ParseError> {
        parse_json(raw).map(ParsedRecord::Json)
    }

    fn format(&self) -> LogFormat {
        LogFormat::Json
    }
}

/// Parse a JSON-encoded line into its top-level object.
///
/// Surrounding whitespace is trimmed. Arrays, strings, numbers, booleans and
/// `null` are rejected: downstream records are always key/value shaped.
pub fn parse_json(message_raw: &str) -> Result<Map<String, Value>, ParseError> {
    check_line_size(message_raw)?;

    let trimmed = message_raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| {
        tracing::debug!("Failed to parse JSON: {}", e);
        ParseError::InvalidJson {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        }
    })?;

    match value {
        Value::Object(map) => {
            tracing::debug!("Successfully parsed JSON with {} top-level keys", map.len());
            Ok(map)
        }
        other => Err(ParseError::NotAnObject(json_type_name(&other))),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
