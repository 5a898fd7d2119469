pub use super::model::{DetectionResult, LogFormat, ParseError, ParsedRecord};

pub trait FormatDetector: Send + Sync {
    fn detect(&self, sample: &str) -> DetectionResult;
    fn format(&self) -> LogFormat;
}

pub trait LogParser: Send + Sync {
    /// parse one raw log line into a normalized record
    fn parse(&self, raw: &str) -> Result<ParsedRecord, ParseError>;
    fn format(&self) -> LogFormat;
}
