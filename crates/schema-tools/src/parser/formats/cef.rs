use crate::parser::check_line_size;
use crate::parser::fields::Fields;
use crate::parser::model::{CefHeader, CefRecord};
use crate::parser::traits::*;

const CEF_MARKER: &str = "CEF:";
const HEADER_FIELDS: usize = 7;
const MAX_SEGMENTS: usize = HEADER_FIELDS + 1;

pub struct CefDetector;

impl FormatDetector for CefDetector {
    fn detect(&self, sample: &str) -> DetectionResult {
        let Some(start) = sample.find(CEF_MARKER) else {
            return DetectionResult::no_match();
        };

        // Example: <189>Sep 21 05:44:42 Host CEF:0|Fortinet|Fortigate|v7.0|001|traffic|3|src=10.1.1.1
        let segments = sample[start + CEF_MARKER.len()..].split('|').count();
        if (HEADER_FIELDS..=MAX_SEGMENTS).contains(&segments) {
            DetectionResult::new(LogFormat::Cef, 0.97)
        } else {
            // Marker present but the header will not parse
            DetectionResult::new(LogFormat::Cef, 0.4)
        }
    }

    fn format(&self) -> LogFormat {
        LogFormat::Cef
    }
}

/// Parser for Common Event Format lines.
///
/// Everything before the `CEF:` marker is kept verbatim (trimmed) as the
/// syslog prefix. The seven header fields are taken positionally from the
/// pipe-delimited segments after the marker; whatever follows the seventh
/// pipe is the extension.
pub struct CefParser;

impl LogParser for CefParser {
    fn parse(&self, raw: &str) -> Result<ParsedRecord, ParseError> {
        parse_cef(raw).map(ParsedRecord::Cef)
    }

    fn format(&self) -> LogFormat {
        LogFormat::Cef
    }
}

pub fn parse_cef(message_raw: &str) -> Result<CefRecord, ParseError> {
    check_line_size(message_raw)?;

    let message = message_raw.trim();
    if message.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let start = message.find(CEF_MARKER).ok_or(ParseError::CefMarkerNotFound)?;
    let syslog_prefix = message[..start].trim().to_string();
    let parts: Vec<&str> = message[start + CEF_MARKER.len()..].split('|').collect();

    if parts.len() < HEADER_FIELDS {
        return Err(ParseError::CefHeaderTooShort(parts.len()));
    }
    // Header pipes are never unescaped, so an extra segment is ambiguous.
    if parts.len() > MAX_SEGMENTS {
        return Err(ParseError::CefTooManyPipes(parts.len()));
    }

    let header_segments: [&str; HEADER_FIELDS] = [
        parts[0], parts[1], parts[2], parts[3], parts[4], parts[5], parts[6],
    ];
    let cef_header = CefHeader::from_segments(&header_segments);
    let extension_str = parts[HEADER_FIELDS..].join("|");
    let extension = parse_cef_extension(&extension_str);

    tracing::debug!(
        "Successfully parsed CEF: vendor={}, product={}, extension_fields={}",
        cef_header.device_vendor,
        cef_header.device_product,
        extension.len()
    );

    Ok(CefRecord {
        syslog_prefix,
        cef_header,
        extension,
    })
}

/// Tokenize a CEF extension into ordered key/value pairs.
///
/// A backslash copies the next character into the value literally. An
/// unescaped space inside a value ends it only when the text after the space
/// reaches an `=` before any further space, i.e. it looks like `key=`.
/// Otherwise the space belongs to the value, which is what lets
/// `msg=Hello World test=value` keep `Hello World` intact.
///
/// Known limitation: a value that itself contains `word=word` after a space
/// is split at that point.
pub fn parse_cef_extension(extension: &str) -> Fields {
    let mut fields = Fields::new();
    if extension.trim().is_empty() {
        return fields;
    }

    let chars: Vec<char> = extension.chars().collect();
    let next_equals = next_index_of(&chars, '=');
    let next_space = next_index_of(&chars, ' ');

    let mut current_key: Option<String> = None;
    let mut buffer = String::new();
    let mut in_value = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() {
            if in_value {
                buffer.push(chars[i + 1]);
            }
            i += 2;
            continue;
        }

        if c == '=' && !in_value {
            let key = buffer.trim();
            if !key.is_empty() {
                current_key = Some(key.to_string());
                buffer.clear();
                in_value = true;
            }
            i += 1;
            continue;
        }

        if c == ' ' && in_value && starts_next_key(&chars, i, &next_equals, &next_space) {
            if let Some(key) = current_key.take() {
                fields.insert(key, std::mem::take(&mut buffer));
            }
            in_value = false;
            i += 1;
            continue;
        }

        buffer.push(c);
        i += 1;
    }

    if let Some(key) = current_key {
        if !buffer.is_empty() {
            fields.insert(key, buffer);
        }
    }

    fields
}

/// Whether the text right after the space at `space_at` is a bare `key=`.
fn starts_next_key(
    chars: &[char],
    space_at: usize,
    next_equals: &[Option<usize>],
    next_space: &[Option<usize>],
) -> bool {
    let Some(eq) = next_equals[space_at] else {
        return false;
    };
    let following_space = next_space.get(space_at + 1).copied().flatten();
    if matches!(following_space, Some(sp) if sp < eq) {
        return false;
    }

    let candidate: String = chars[space_at + 1..eq].iter().collect();
    let candidate = candidate.trim();
    !candidate.is_empty() && !candidate.contains(|c: char| c == ' ' || c == '=')
}

/// `out[j]` is the first index `>= j` holding `needle`.
fn next_index_of(chars: &[char], needle: char) -> Vec<Option<usize>> {
    let mut out = vec![None; chars.len() + 1];
    for j in (0..chars.len()).rev() {
        out[j] = if chars[j] == needle { Some(j) } else { out[j + 1] };
    }
    out
}
