use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::model::{IdentificationRule, LogType, ParsedFieldMetadata, SchemaDocument};
use crate::error::SchemaError;
use crate::parser::formats::json::json_type_name;

/// Decode `text` and check it against the schema document contract.
///
/// All-or-nothing: the first structural error (missing or mistyped field)
/// fails immediately, then every range and hierarchy violation is collected
/// into a single error.
pub fn parse_and_validate(text: &str) -> Result<SchemaDocument, SchemaError> {
    let payload: Value = serde_json::from_str(text).map_err(|e| {
        tracing::error!("Model output is not valid JSON: {}", e);
        SchemaError::InvalidJson(e.to_string())
    })?;

    if !payload.is_object() {
        return Err(SchemaError::NotAnObject(json_type_name(&payload)));
    }

    let document: SchemaDocument = serde_json::from_value(payload).map_err(|e| {
        tracing::error!("Model output failed SchemaDocument validation: {}", e);
        SchemaError::Validation(vec![e.to_string()])
    })?;

    let violations = check_document(&document);
    if !violations.is_empty() {
        tracing::error!("Schema document has {} violations", violations.len());
        return Err(SchemaError::Validation(violations));
    }

    tracing::debug!(
        "Validated schema document for index {} with {} log types",
        document.index_name,
        document.log_types.len()
    );
    Ok(document)
}

/// Range and hierarchy checks that the type system does not cover.
pub fn check_document(document: &SchemaDocument) -> Vec<String> {
    let mut violations = Vec::new();

    check_unit_interval(&mut violations, "analysis_confidence", document.analysis_confidence);
    if document.processing_time_minutes < 0.0 {
        violations.push(format!(
            "processing_time_minutes: must be >= 0, got {}",
            document.processing_time_minutes
        ));
    }

    for (key, log_type) in &document.log_types {
        check_log_type(&mut violations, &format!("log_types.{}", key), log_type);
    }

    violations
}

fn check_log_type(violations: &mut Vec<String>, at: &str, log_type: &LogType) {
    let rules = &log_type.identification_rules;
    for (group, list) in [("primary", &rules.primary), ("secondary", &rules.secondary)] {
        for (idx, rule) in list.iter().enumerate() {
            check_rule(violations, &format!("{}.identification_rules.{}[{}]", at, group, idx), rule);
        }
    }

    check_parse_levels(violations, &format!("{}.parsing_metadata", at), &log_type.parsing_metadata);
}

fn check_rule(violations: &mut Vec<String>, at: &str, rule: &IdentificationRule) {
    check_unit_interval(violations, &format!("{}.confidence", at), rule.confidence);
}

/// Levels must form a forest: no cycles through `parent_parsed_field`, level
/// 0 without a parent, and parent level + 1 when the parent is listed.
/// A parent that is not listed is accepted as-is.
fn check_parse_levels(violations: &mut Vec<String>, at: &str, entries: &[ParsedFieldMetadata]) {
    let mut by_path: HashMap<&str, &ParsedFieldMetadata> = HashMap::new();
    for entry in entries {
        by_path.entry(entry.field_path.as_str()).or_insert(entry);
    }

    let mut cyclic: HashSet<&str> = HashSet::new();
    for entry in entries {
        let start = entry.field_path.as_str();
        let mut seen = HashSet::from([start]);
        let mut current = entry;
        while let Some(parent) = current.parent_parsed_field.as_deref() {
            if !seen.insert(parent) {
                if cyclic.insert(start) {
                    violations.push(format!(
                        "{}: cycle in parent_parsed_field starting at '{}'",
                        at, start
                    ));
                }
                break;
            }
            match by_path.get(parent) {
                Some(&next) => current = next,
                None => break,
            }
        }
    }

    for (idx, entry) in entries.iter().enumerate() {
        if cyclic.contains(entry.field_path.as_str()) {
            continue;
        }
        let expected = match entry.parent_parsed_field.as_deref() {
            None => Some(0),
            Some(parent) => by_path.get(parent).map(|p| p.parse_level.saturating_add(1)),
        };
        if let Some(expected) = expected {
            if entry.parse_level != expected {
                violations.push(format!(
                    "{}[{}].parse_level: expected {} for '{}', got {}",
                    at, idx, expected, entry.field_path, entry.parse_level
                ));
            }
        }
    }
}

fn check_unit_interval(violations: &mut Vec<String>, at: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        violations.push(format!("{}: must be within [0.0, 1.0], got {}", at, value));
    }
}
