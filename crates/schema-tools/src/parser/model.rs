use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::fields::Fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// A JSON object per line
    Json,
    /// Common Event Format (pipe-delimited header + key=value extension)
    Cef,
    /// `<PRI>` prefix followed by space-separated key=value pairs
    SyslogKv,
    /// Unknown/undetected format
    Unknown,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Cef => "cef",
            LogFormat::SyslogKv => "syslog_kv",
            LogFormat::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "json_parser" => Ok(LogFormat::Json),
            "cef" | "cef_parser" => Ok(LogFormat::Cef),
            "syslog_kv" | "syslog-kv" | "syslog_kv_parser" => Ok(LogFormat::SyslogKv),
            other => Err(ParseError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub format: LogFormat,
    /// Confidence level (0.0 - 1.0)
    pub confidence: f32,
}

impl DetectionResult {
    pub fn new(format: LogFormat, confidence: f32) -> Self {
        Self {
            format,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn no_match() -> Self {
        Self {
            format: LogFormat::Unknown,
            confidence: 0.0,
        }
    }

    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= super::HIGH_CONFIDENCE_THRESHOLD
    }

    pub fn is_match(&self) -> bool {
        self.format != LogFormat::Unknown && self.confidence > 0.0
    }
}

/// Input-format errors. Every message carries a stable fragment so callers
/// can grep for the failure class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid input: message_raw must be a non-empty string")]
    EmptyInput,

    #[error("Line too large: {0} bytes (max: {1} bytes)")]
    LineTooLarge(usize, usize),

    #[error("Invalid JSON format: {message}. Error at line {line}, column {column}")]
    InvalidJson {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Parsed JSON is not a dictionary, got {0}")]
    NotAnObject(&'static str),

    #[error("Invalid CEF format: 'CEF:' marker not found")]
    CefMarkerNotFound,

    #[error("Invalid CEF header: expected at least 7 pipe-delimited fields, got {0}")]
    CefHeaderTooShort(usize),

    #[error(
        "Invalid CEF format: too many pipes in header. Expected 7 pipes (8 fields), got {0} fields. \
         If pipes are part of field values, they must be escaped as \\|"
    )]
    CefTooManyPipes(usize),

    #[error("Invalid format: message must start with syslog priority prefix <PRI>")]
    MissingPriorityPrefix,

    #[error("Invalid format: missing closing '>' in syslog priority prefix")]
    UnterminatedPriorityPrefix,

    #[error("No key-value pairs found after priority prefix")]
    NoKeyValuePairs,

    #[error("Invalid key-value pair: no '=' found for key starting at position {0}")]
    MissingEquals(usize),

    #[error("Invalid key-value pair: empty key")]
    EmptyKey,

    #[error("Invalid key-value pair: no value for key '{0}'")]
    MissingValue(String),

    #[error("Invalid key-value pair: unclosed quote for key '{0}'")]
    UnclosedQuote(String),

    #[error("Invalid key-value pair: empty value for key '{0}'")]
    EmptyValue(String),

    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
}

/// The seven positional CEF header fields, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CefHeader {
    pub version: String,
    pub device_vendor: String,
    pub device_product: String,
    pub device_version: String,
    pub signature_id: String,
    pub name: String,
    pub severity: String,
}

impl CefHeader {
    pub const FIELD_NAMES: [&'static str; 7] = [
        "version",
        "device_vendor",
        "device_product",
        "device_version",
        "signature_id",
        "name",
        "severity",
    ];

    /// Build a header from exactly seven positional segments.
    pub(crate) fn from_segments(segments: &[&str; 7]) -> Self {
        Self {
            version: segments[0].to_string(),
            device_vendor: segments[1].to_string(),
            device_product: segments[2].to_string(),
            device_version: segments[3].to_string(),
            signature_id: segments[4].to_string(),
            name: segments[5].to_string(),
            severity: segments[6].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CefRecord {
    pub syslog_prefix: String,
    pub cef_header: CefHeader,
    pub extension: Fields,
}

/// A syslog key-value line. `prefix` is the literal `<PRI>` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogKvRecord {
    pub prefix: String,
    pub fields: Fields,
}

impl SyslogKvRecord {
    pub const PREFIX_KEY: &'static str = "prefix";

    pub fn get(&self, key: &str) -> Option<&str> {
        if key == Self::PREFIX_KEY {
            return Some(&self.prefix);
        }
        self.fields.get(key)
    }
}

impl Serialize for SyslogKvRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        // The reserved prefix always comes first and is never shadowed by a pair.
        let pairs = self
            .fields
            .iter()
            .filter(|(k, _)| k.as_str() != Self::PREFIX_KEY);
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(Self::PREFIX_KEY, &self.prefix)?;
        for (k, v) in pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Output of any format parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedRecord {
    Json(Map<String, Value>),
    Cef(CefRecord),
    SyslogKv(SyslogKvRecord),
}

impl ParsedRecord {
    pub fn format(&self) -> LogFormat {
        match self {
            ParsedRecord::Json(_) => LogFormat::Json,
            ParsedRecord::Cef(_) => LogFormat::Cef,
            ParsedRecord::SyslogKv(_) => LogFormat::SyslogKv,
        }
    }

    /// Normalized nested mapping for the record.
    pub fn into_value(self) -> Value {
        match self {
            ParsedRecord::Json(map) => Value::Object(map),
            // Serializing plain strings and string maps cannot fail.
            other => serde_json::to_value(&other).unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_round_trip_names() {
        for format in [LogFormat::Json, LogFormat::Cef, LogFormat::SyslogKv] {
            let parsed: LogFormat = format.as_str().parse().unwrap();
            assert_eq!(parsed, format);
        }
        assert_eq!("cef_parser".parse::<LogFormat>().unwrap(), LogFormat::Cef);
        assert_eq!("Syslog-KV".parse::<LogFormat>().unwrap(), LogFormat::SyslogKv);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_detection_result_clamps() {
        assert_eq!(DetectionResult::new(LogFormat::Json, 1.7).confidence, 1.0);
        assert_eq!(DetectionResult::new(LogFormat::Json, -0.2).confidence, 0.0);
        assert!(!DetectionResult::no_match().is_match());
    }

    #[test]
    fn test_cef_header_serializes_in_wire_order() {
        let header = CefHeader::from_segments(&["0", "V", "P", "1", "100", "E", "5"]);
        let value = serde_json::to_value(&header).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, CefHeader::FIELD_NAMES);
    }

    #[test]
    fn test_syslog_record_prefix_first_and_reserved() {
        let mut fields = Fields::new();
        fields.insert("prefix".to_string(), "shadow".to_string());
        fields.insert("a".to_string(), "1".to_string());
        let record = SyslogKvRecord {
            prefix: "<13>".to_string(),
            fields,
        };

        let value = ParsedRecord::SyslogKv(record.clone()).into_value();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.keys().next().map(|k| k.as_str()), Some("prefix"));
        assert_eq!(obj["prefix"], "<13>");
        assert_eq!(obj["a"], "1");
        assert_eq!(record.get("prefix"), Some("<13>"));
    }

    #[test]
    fn test_error_messages_carry_fragments() {
        assert!(ParseError::CefTooManyPipes(10).to_string().contains("too many pipes"));
        assert!(ParseError::UnclosedQuote("k".into()).to_string().contains("unclosed quote"));
        assert!(ParseError::NotAnObject("list").to_string().contains("not a dictionary"));
        assert!(ParseError::EmptyInput.to_string().contains("Invalid input"));
    }
}
