use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Complete schema analysis for one log index. This is the persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub index_name: String,
    pub total_logs_analyzed: u64,
    pub analysis_batches_processed: u64,
    pub log_types: BTreeMap<String, LogType>,
    /// In `[0, 1]`
    pub analysis_confidence: f64,
    pub stopping_reason: String,
    #[serde(default)]
    pub data_quality_issues: Vec<String>,
    pub requires_human_review: bool,
    pub analysis_notes: String,
    /// Non-negative wall-clock minutes
    pub processing_time_minutes: f64,
}

impl SchemaDocument {
    /// Conventional artifact name, `<index_name>_schema.json`.
    pub fn file_name(&self) -> String {
        format!("{}_schema.json", self.index_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogType {
    pub name: String,
    pub primary_use: String,
    pub count_in_dataset: u64,
    pub identification_rules: IdentificationRules,
    pub schema: BTreeMap<String, FieldSchema>,
    /// Application order; empty when no nested parsing was needed
    #[serde(default)]
    pub parsing_metadata: Vec<ParsedFieldMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationRules {
    pub primary: Vec<IdentificationRule>,
    #[serde(default)]
    pub secondary: Vec<IdentificationRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationRule {
    pub field: String,
    pub operator: String,
    /// String, number or pattern; any JSON value is kept as given
    pub value: Value,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub field_path: String,
    pub semantic_type: String,
    #[serde(default)]
    pub examples: Vec<Value>,
    #[serde(default)]
    pub common_patterns: Vec<String>,
}

/// One parsing step applied to a field.
///
/// `parent_parsed_field` is a back-reference by field path, never ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFieldMetadata {
    pub field_path: String,
    pub parsers_or_formats: Vec<String>,
    /// Immediate children only
    #[serde(default)]
    pub resulting_field_paths: Vec<String>,
    #[serde(default)]
    pub parent_parsed_field: Option<String>,
    #[serde(default)]
    pub parse_level: u32,
}
