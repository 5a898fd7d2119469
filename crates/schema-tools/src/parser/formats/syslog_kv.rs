use crate::parser::check_line_size;
use crate::parser::fields::Fields;
use crate::parser::model::SyslogKvRecord;
use crate::parser::traits::*;

/// Longest priority value is `<191>`
const MAX_PRI_DIGITS: usize = 3;

pub struct SyslogKvDetector;

impl FormatDetector for SyslogKvDetector {
    fn detect(&self, sample: &str) -> DetectionResult {
        // Example: <189>date=2024-01-15 devname="FG-100F" srcip=10.1.1.1
        let sample = sample.trim();
        if !sample.starts_with('<') {
            return DetectionResult::no_match();
        }

        let Some(end) = sample.find('>') else {
            return DetectionResult::no_match();
        };
        let pri = &sample[1..end];
        if pri.is_empty() || pri.len() > MAX_PRI_DIGITS || !pri.bytes().all(|b| b.is_ascii_digit()) {
            return DetectionResult::no_match();
        }

        let body = sample[end + 1..].trim_start();
        // CEF lines share the priority prefix; leave them to the CEF detector.
        if body.contains("CEF:") {
            return DetectionResult::new(LogFormat::SyslogKv, 0.3);
        }

        let first_token = body.split(' ').next().unwrap_or_default();
        match first_token.find('=') {
            Some(idx) if idx > 0 => DetectionResult::new(LogFormat::SyslogKv, 0.9),
            _ => DetectionResult::new(LogFormat::SyslogKv, 0.3),
        }
    }

    fn format(&self) -> LogFormat {
        LogFormat::SyslogKv
    }
}

/// Parser for `<PRI>key=value key2="quoted value"` lines.
///
/// Values are kept as raw strings. Quoted values keep their inner text
/// verbatim, escape sequences included; numeric-looking values are never
/// coerced.
pub struct SyslogKvParser;

impl LogParser for SyslogKvParser {
    fn parse(&self, raw: &str) -> Result<ParsedRecord, ParseError> {
        parse_syslog_kv(raw).map(ParsedRecord::SyslogKv)
    }

    fn format(&self) -> LogFormat {
        LogFormat::SyslogKv
    }
}

pub fn parse_syslog_kv(message_raw: &str) -> Result<SyslogKvRecord, ParseError> {
    check_line_size(message_raw)?;

    let message = message_raw.trim();
    if message.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    if !message.starts_with('<') {
        return Err(ParseError::MissingPriorityPrefix);
    }

    let end = message.find('>').ok_or(ParseError::UnterminatedPriorityPrefix)?;
    let prefix = message[..=end].to_string();

    let body = message[end + 1..].trim();
    if body.is_empty() {
        return Err(ParseError::NoKeyValuePairs);
    }

    let fields = parse_pairs(body)?;
    tracing::debug!("Successfully parsed syslog KV: prefix={}, fields={}", prefix, fields.len());

    Ok(SyslogKvRecord { prefix, fields })
}

/// Tokenize space-separated `key=value` pairs. Positions in errors are byte
/// offsets into `body`.
fn parse_pairs(body: &str) -> Result<Fields, ParseError> {
    // Every delimiter is ASCII, so byte offsets are always char boundaries.
    let bytes = body.as_bytes();
    let len = bytes.len();
    let mut fields = Fields::new();
    let mut pos = 0;

    while pos < len {
        while pos < len && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        let key_start = pos;
        let eq = find_unescaped(bytes, pos, b'=').ok_or(ParseError::MissingEquals(key_start))?;
        let key = body[key_start..eq].trim();
        if key.is_empty() {
            return Err(ParseError::EmptyKey);
        }

        pos = eq + 1;
        if pos >= len {
            return Err(ParseError::MissingValue(key.to_string()));
        }

        let value = if bytes[pos] == b'"' {
            let start = pos + 1;
            let mut i = start;
            loop {
                if i >= len {
                    return Err(ParseError::UnclosedQuote(key.to_string()));
                }
                match bytes[i] {
                    b'\\' => i += 2,
                    b'"' => break,
                    _ => i += 1,
                }
            }
            pos = i + 1;
            &body[start..i]
        } else {
            let end = find_unescaped(bytes, pos, b' ').unwrap_or(len);
            let value = &body[pos..end];
            if value.is_empty() {
                return Err(ParseError::EmptyValue(key.to_string()));
            }
            pos = end;
            value
        };

        fields.insert(key.to_string(), value.to_string());
    }

    Ok(fields)
}

fn find_unescaped(bytes: &[u8], from: usize, target: u8) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == target => return Some(i),
            _ => i += 1,
        }
    }
    None
}
