/// Log format detection and structural parsing.
///
/// Converts semi-structured log lines into normalized nested mappings.
///
/// # Architecture
///
/// - `traits.rs`: Core traits for detectors and parsers
/// - `detector.rs`: Picks the most likely format for a line
/// - `formats/`: JSON, CEF and syslog key-value parsers and detectors
/// - `fields.rs`: Ordered unique-key pairs used by the key=value formats
///
/// All parsers are pure functions of their input: no shared state, safe to
/// call from any thread.

pub mod traits;
pub mod detector;
pub mod fields;
pub mod formats;
pub mod model;

pub use traits::{FormatDetector, LogParser};
pub use model::{CefHeader, CefRecord, DetectionResult, LogFormat, ParseError, ParsedRecord, SyslogKvRecord};
pub use fields::Fields;
pub use formats::{parse_cef, parse_json, parse_syslog_kv};
pub use detector::{parse_auto, parse_with, FormatDetectorOrchestrator};

// Constants
pub const MAX_LINE_SIZE: usize = 1_048_576; // 1MB
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.95;

/// Reject oversized lines before any tokenizing.
pub(crate) fn check_line_size(raw: &str) -> Result<(), ParseError> {
    if raw.len() > MAX_LINE_SIZE {
        return Err(ParseError::LineTooLarge(raw.len(), MAX_LINE_SIZE));
    }
    Ok(())
}
