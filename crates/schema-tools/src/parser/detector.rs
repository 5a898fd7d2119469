use super::traits::*;
use super::formats::*;

/// Format detector orchestrator
/// 1. Every detector scores a line; the best confidence wins
/// 2. Multi-line samples are decided by a weighted majority vote
pub struct FormatDetectorOrchestrator {
    detectors: Vec<Box<dyn FormatDetector>>,
}

impl FormatDetectorOrchestrator {
    pub fn new() -> Self {
        let detectors: Vec<Box<dyn FormatDetector>> = vec![
            // CEF before syslog KV: CEF lines usually carry a <PRI> prefix too
            Box::new(JsonDetector),
            Box::new(CefDetector),
            Box::new(SyslogKvDetector),
        ];

        Self { detectors }
    }

    pub fn detect_single(&self, sample: &str) -> DetectionResult {
        self.run_detectors(sample)
    }

    pub fn detect_multi(&self, samples: &[&str]) -> DetectionResult {
        if samples.is_empty() {
            return DetectionResult::no_match();
        }

        let results: Vec<DetectionResult> = samples
            .iter()
            .map(|sample| self.run_detectors(sample))
            .collect();

        self.majority_vote(results)
    }

    fn run_detectors(&self, sample: &str) -> DetectionResult {
        let mut best_result = DetectionResult::no_match();

        for detector in &self.detectors {
            let result = detector.detect(sample);

            if result.confidence > best_result.confidence {
                best_result = result;
                if best_result.confidence >= 0.99 {
                    break;
                }
            }
        }

        best_result
    }

    fn majority_vote(&self, results: Vec<DetectionResult>) -> DetectionResult {
        use std::collections::HashMap;

        let total_results = results.len();

        let mut votes: HashMap<LogFormat, Vec<f32>> = HashMap::new();
        for result in results {
            if !result.is_match() {
                continue;
            }
            votes.entry(result.format)
                .or_default()
                .push(result.confidence);
        }

        let mut best = DetectionResult::no_match();
        let mut best_score = 0.0f32;

        // Sorted so ties resolve the same way on every run
        let mut formats: Vec<_> = votes.keys().copied().collect();
        formats.sort();

        for format in formats {
            if let Some(confidences) = votes.get(&format) {
                let avg_confidence: f32 = confidences.iter().sum::<f32>() / confidences.len() as f32;
                let score = (confidences.len() as f32 / total_results as f32) * avg_confidence;

                if score > best_score {
                    best_score = score;
                    best = DetectionResult::new(format, avg_confidence);
                }
            }
        }

        best
    }
}

impl Default for FormatDetectorOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a line with the parser for an explicitly chosen format.
pub fn parse_with(format: LogFormat, raw: &str) -> Result<ParsedRecord, ParseError> {
    match format {
        LogFormat::Json => JsonParser.parse(raw),
        LogFormat::Cef => CefParser.parse(raw),
        LogFormat::SyslogKv => SyslogKvParser.parse(raw),
        LogFormat::Unknown => Err(ParseError::UnknownFormat(format.as_str().to_string())),
    }
}

/// Detect the format of a single line, then parse it.
pub fn parse_auto(raw: &str) -> Result<ParsedRecord, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let detection = FormatDetectorOrchestrator::new().detect_single(raw);
    if !detection.is_match() {
        return Err(ParseError::UnknownFormat("no detector matched the line".to_string()));
    }

    tracing::debug!(
        "Detected format {} with confidence {:.2}",
        detection.format.as_str(),
        detection.confidence
    );
    parse_with(detection.format, raw)
}
