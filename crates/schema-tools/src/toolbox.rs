//! Tool façade: one owner for config, guards and the handle registry, and a
//! name-based dispatcher for tool calls.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::conf::ToolsConfig;
use crate::error::{Result, ToolError};
use crate::files::{self, JsonlFiles};
use crate::guard::{CommandAllowlist, PathGuard};
use crate::handles::HandleRegistry;
use crate::parser::{self, FormatDetectorOrchestrator, LogFormat};
use crate::schema;

/// Arguments of a tool call.
///
/// Single-input tools accept either form; everything else needs a mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    Structured(Map<String, Value>),
    Opaque(String),
}

impl ToolArguments {
    pub fn structured(value: Value) -> Self {
        match value {
            Value::Object(map) => ToolArguments::Structured(map),
            Value::String(text) => ToolArguments::Opaque(text),
            other => ToolArguments::Opaque(other.to_string()),
        }
    }

    /// The single input of a one-argument tool, named `key` when structured.
    fn single(&self, key: &str) -> Result<String> {
        match self {
            ToolArguments::Opaque(text) => Ok(text.clone()),
            ToolArguments::Structured(_) => self.required_str(key),
        }
    }

    fn map(&self) -> Result<&Map<String, Value>> {
        match self {
            ToolArguments::Structured(map) => Ok(map),
            ToolArguments::Opaque(_) => Err(ToolError::InvalidArguments(
                "expected a mapping of named arguments".to_string(),
            )),
        }
    }

    fn required_str(&self, key: &str) -> Result<String> {
        self.optional_str(key)?
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing string argument '{}'", key)))
    }

    fn optional_str(&self, key: &str) -> Result<Option<String>> {
        match self.map()?.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(type_error(key, "a string")),
        }
    }

    fn optional_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.map()?.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| type_error(key, "a non-negative integer")),
        }
    }

    fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.map()?.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(type_error(key, "a boolean")),
        }
    }

    fn optional_str_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.map()?.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(|| type_error(key, "a list of strings")))
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(_) => Err(type_error(key, "a list of strings")),
        }
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(map: Map<String, Value>) -> Self {
        ToolArguments::Structured(map)
    }
}

impl From<String> for ToolArguments {
    fn from(text: String) -> Self {
        ToolArguments::Opaque(text)
    }
}

impl From<&str> for ToolArguments {
    fn from(text: &str) -> Self {
        ToolArguments::Opaque(text.to_string())
    }
}

fn type_error(key: &str, expected: &str) -> ToolError {
    ToolError::InvalidArguments(format!("argument '{}' must be {}", key, expected))
}

pub struct Toolbox {
    config: ToolsConfig,
    guard: PathGuard,
    commands: CommandAllowlist,
    jsonl: JsonlFiles,
}

impl Toolbox {
    pub const TOOL_NAMES: [&'static str; 16] = [
        "json_parser",
        "cef_parser",
        "syslog_kv_parser",
        "auto_parser",
        "parse_and_validate_schema_document",
        "persist_schema",
        "open_and_register_jsonl",
        "read_jsonl",
        "close_jsonl",
        "read_file_content",
        "write_file_content",
        "list_directory_contents",
        "search_files",
        "line_count",
        "write_json",
        "run_safe_command",
    ];

    pub fn new(config: ToolsConfig) -> Self {
        let guard = PathGuard::new(
            config.project_root.clone(),
            config.read_dirs.clone(),
            config.write_roots(),
        );
        let commands = CommandAllowlist::standard(config.read_dirs.clone())
            .with_default_timeout(config.command_timeout());
        let jsonl = JsonlFiles::new(Arc::new(HandleRegistry::new()), guard.clone());

        Self {
            config,
            guard,
            commands,
            jsonl,
        }
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn commands(&self) -> &CommandAllowlist {
        &self.commands
    }

    pub fn jsonl(&self) -> &JsonlFiles {
        &self.jsonl
    }

    /// Close every open handle.
    pub fn shutdown(&self) {
        let open = self.jsonl.registry().len();
        self.jsonl.registry().clear();
        tracing::info!("Toolbox shut down, closed {} open handles", open);
    }

    /// Run the tool called `tool` and return its JSON result.
    pub async fn dispatch(&self, tool: &str, args: ToolArguments) -> Result<Value> {
        tracing::debug!("Dispatching tool {}", tool);
        match tool {
            "json_parser" => self.parse(LogFormat::Json, &args),
            "cef_parser" => self.parse(LogFormat::Cef, &args),
            "syslog_kv_parser" => self.parse(LogFormat::SyslogKv, &args),
            "auto_parser" => {
                let raw = args.single("message_raw")?;
                let forced = match &args {
                    ToolArguments::Structured(_) => args.optional_str("format")?,
                    ToolArguments::Opaque(_) => None,
                };
                let record = match forced {
                    Some(name) => parser::parse_with(name.parse::<LogFormat>()?, &raw)?,
                    None => parser::parse_auto(&raw)?,
                };
                Ok(record.into_value())
            }
            "parse_and_validate_schema_document" => {
                let text = args.single("text")?;
                let document = schema::parse_and_validate(&text)?;
                Ok(serde_json::to_value(document)?)
            }
            "persist_schema" => {
                let text = args.required_str("text")?;
                let overwrite = args.optional_bool("overwrite")?.unwrap_or(false);
                let document = schema::parse_and_validate(&text)?;
                let output_dir = self.config.output_dir();
                let path = schema::persist_schema(&self.guard, &document, &output_dir, overwrite)?;
                Ok(path_value(path))
            }
            "open_and_register_jsonl" => {
                let path = args.single("path")?;
                let id = self.jsonl.open(path)?;
                Ok(json!({ "handle_entry_id": id }))
            }
            "read_jsonl" => {
                let id = args.required_str("handle_entry_id")?;
                let n = match args.optional_u64("number_of_lines")? {
                    Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
                    None => self.config.batch_size,
                };
                Ok(json!(self.jsonl.read(&id, n)?))
            }
            "close_jsonl" => {
                let id = args.single("handle_entry_id")?;
                Ok(serde_json::to_value(self.jsonl.close(&id)?)?)
            }
            "read_file_content" => {
                let path = args.single("file_path")?;
                let max_lines = match &args {
                    ToolArguments::Structured(_) => args.optional_u64("max_lines")?.map(|n| n as usize),
                    ToolArguments::Opaque(_) => None,
                };
                Ok(Value::String(files::read_file_content(&self.guard, path, max_lines)?))
            }
            "write_file_content" => {
                let path = args.required_str("file_path")?;
                let content = args.required_str("content")?;
                let overwrite = args.optional_bool("overwrite")?.unwrap_or(false);
                Ok(path_value(files::write_file_content(&self.guard, path, &content, overwrite)?))
            }
            "list_directory_contents" => {
                let dir = args.single("directory_path")?;
                let (pattern, files_only) = match &args {
                    ToolArguments::Structured(_) => (
                        args.optional_str("pattern")?,
                        args.optional_bool("files_only")?.unwrap_or(false),
                    ),
                    ToolArguments::Opaque(_) => (None, false),
                };
                let listed = files::list_directory_contents(&self.guard, dir, pattern.as_deref(), files_only)?;
                Ok(paths_value(listed))
            }
            "search_files" => {
                let pattern = args.single("pattern")?;
                let (dirs, max_results) = match &args {
                    ToolArguments::Structured(_) => (
                        args.optional_str_list("search_dirs")?
                            .map(|dirs| dirs.into_iter().map(PathBuf::from).collect::<Vec<_>>()),
                        args.optional_u64("max_results")?.map(|n| n as usize),
                    ),
                    ToolArguments::Opaque(_) => (None, None),
                };
                let found = files::search_files(
                    &self.guard,
                    &self.config.search_dirs,
                    &pattern,
                    dirs.as_deref(),
                    max_results.unwrap_or(self.config.max_search_results),
                )?;
                Ok(paths_value(found))
            }
            "line_count" => {
                let path = args.single("path")?;
                Ok(json!(files::line_count(&self.guard, path)?))
            }
            "write_json" => {
                let data = args.required_str("json_data")?;
                let output = args.required_str("output_file")?;
                Ok(path_value(files::write_json(&self.guard, &data, output)?))
            }
            "run_safe_command" => {
                let command_type = args.required_str("command_type")?;
                let command_args = args.optional_str_list("command_args")?.unwrap_or_default();
                let timeout = args.optional_u64("timeout")?.map(Duration::from_secs);
                let cwd = args.optional_str("working_directory")?.map(PathBuf::from);
                let output = self
                    .commands
                    .validate_and_run(&command_type, &command_args, timeout, cwd.as_deref())
                    .await?;
                Ok(serde_json::to_value(output)?)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Page a JSONL file through the registry, count the detected format of
    /// every non-blank line, and vote on the format of the first batch.
    pub fn scan_jsonl(&self, path: impl AsRef<Path>) -> Result<ScanReport> {
        let path = path.as_ref();
        let started_at = Utc::now();
        let detector = FormatDetectorOrchestrator::new();
        let mut formats: BTreeMap<LogFormat, u64> = BTreeMap::new();
        let mut sample: Vec<String> = Vec::new();
        let mut lines = 0u64;
        let mut batches = 0usize;

        let id = self.jsonl.open(path)?;
        let scanned = loop {
            let batch = match self.jsonl.read(&id, self.config.batch_size) {
                Ok(batch) => batch,
                Err(e) => break Err(e),
            };
            if batch.is_empty() {
                break Ok(());
            }
            let first_batch = batches == 0;
            batches += 1;
            for line in &batch {
                let raw = files::raw_message(line);
                if raw.is_empty() {
                    continue;
                }
                lines += 1;
                *formats.entry(detector.detect_single(&raw).format).or_default() += 1;
                if first_batch {
                    sample.push(raw);
                }
            }
        };
        self.jsonl.close(&id)?;
        scanned?;

        let samples: Vec<&str> = sample.iter().map(String::as_str).collect();
        let sampled = detector.detect_multi(&samples);

        let finished_at = Utc::now();
        tracing::info!(
            "Scanned {} lines from {} in {}ms, sampled format {} ({:.2})",
            lines,
            path.display(),
            (finished_at - started_at).num_milliseconds(),
            sampled.format.as_str(),
            sampled.confidence
        );
        Ok(ScanReport {
            path: path.to_path_buf(),
            started_at,
            finished_at,
            lines,
            formats,
            sampled_format: sampled.format,
            sampled_confidence: sampled.confidence,
        })
    }

    fn parse(&self, format: LogFormat, args: &ToolArguments) -> Result<Value> {
        let raw = args.single("message_raw")?;
        Ok(parser::parse_with(format, &raw)?.into_value())
    }
}

/// Per-format line counts for one JSONL file.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub lines: u64,
    pub formats: BTreeMap<LogFormat, u64>,
    /// Weighted majority vote over the first batch
    pub sampled_format: LogFormat,
    pub sampled_confidence: f32,
}

fn path_value(path: PathBuf) -> Value {
    Value::String(path.display().to_string())
}

fn paths_value(paths: Vec<PathBuf>) -> Value {
    Value::Array(paths.into_iter().map(path_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseError;
    use std::fs;
    use tempfile::TempDir;

    fn toolbox() -> (TempDir, PathBuf, Toolbox) {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("custom_parsers")).unwrap();
        fs::create_dir_all(root.join("log_samples")).unwrap();
        fs::create_dir_all(root.join("output")).unwrap();
        let toolbox = Toolbox::new(ToolsConfig::for_root(&root));
        (dir, root, toolbox)
    }

    fn args(value: Value) -> ToolArguments {
        ToolArguments::structured(value)
    }

    #[tokio::test]
    async fn test_parsers_accept_both_argument_forms() {
        let (_dir, _root, tb) = toolbox();

        let opaque = tb.dispatch("syslog_kv_parser", "<13>a=1 b=\"x y\"".into()).await.unwrap();
        assert_eq!(opaque, json!({"prefix": "<13>", "a": "1", "b": "x y"}));

        let structured = tb
            .dispatch("json_parser", args(json!({"message_raw": "{\"k\": [1, 2]}"})))
            .await
            .unwrap();
        assert_eq!(structured, json!({"k": [1, 2]}));

        let cef = tb
            .dispatch("cef_parser", "CEF:0|V|P|1|100|Name|5|src=1.2.3.4".into())
            .await
            .unwrap();
        assert_eq!(cef["cef_header"]["severity"], "5");
        assert_eq!(cef["extension"]["src"], "1.2.3.4");
    }

    #[tokio::test]
    async fn test_auto_parser_detects_or_takes_a_format() {
        let (_dir, _root, tb) = toolbox();

        let detected = tb.dispatch("auto_parser", "<13>user=alice action=login".into()).await.unwrap();
        assert_eq!(detected["prefix"], "<13>");

        // A JSON-looking line forced through the syslog parser fails on the prefix
        let err = tb
            .dispatch("auto_parser", args(json!({"message_raw": "{\"a\": 1}", "format": "syslog_kv"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("priority prefix"));

        let forced = tb
            .dispatch("auto_parser", args(json!({"message_raw": "{\"a\": 1}", "format": "json_parser"})))
            .await
            .unwrap();
        assert_eq!(forced, json!({"a": 1}));

        let err = tb
            .dispatch("auto_parser", args(json!({"message_raw": "x", "format": "xml"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Parse(ParseError::UnknownFormat(_))));
    }

    #[tokio::test]
    async fn test_parse_errors_surface() {
        let (_dir, _root, tb) = toolbox();
        let err = tb.dispatch("cef_parser", "no marker here".into()).await.unwrap_err();
        assert!(matches!(err, ToolError::Parse(_)));
        assert!(err.to_string().contains("'CEF:' marker not found"));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments() {
        let (_dir, _root, tb) = toolbox();

        let err = tb.dispatch("rm_rf", "x".into()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));

        let err = tb.dispatch("read_jsonl", "opaque".into()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = tb
            .dispatch("json_parser", args(json!({"message_raw": 5})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[tokio::test]
    async fn test_jsonl_workflow() {
        let (_dir, root, tb) = toolbox();
        fs::write(root.join("log_samples/in.jsonl"), "{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n").unwrap();

        let opened = tb
            .dispatch("open_and_register_jsonl", "log_samples/in.jsonl".into())
            .await
            .unwrap();
        let id = opened["handle_entry_id"].as_str().unwrap().to_string();

        let batch = tb
            .dispatch("read_jsonl", args(json!({"handle_entry_id": &id, "number_of_lines": 2})))
            .await
            .unwrap();
        assert_eq!(batch, json!(["{\"n\":1}\n", "{\"n\":2}\n"]));

        let err = tb
            .dispatch("read_jsonl", args(json!({"handle_entry_id": &id, "number_of_lines": 0})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("greater than 0"));

        let closed = tb.dispatch("close_jsonl", id.as_str().into()).await.unwrap();
        assert_eq!(closed["lines_read"], 2);

        let err = tb.dispatch("close_jsonl", id.as_str().into()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid or expired handle"));
    }

    #[tokio::test]
    async fn test_file_tools() {
        let (_dir, root, tb) = toolbox();

        tb.dispatch(
            "write_file_content",
            args(json!({"file_path": "custom_parsers/p.py", "content": "a\nb\n"})),
        )
        .await
        .unwrap();
        let count = tb.dispatch("line_count", "custom_parsers/p.py".into()).await.unwrap();
        assert_eq!(count, json!(2));

        let head = tb
            .dispatch("read_file_content", args(json!({"file_path": "custom_parsers/p.py", "max_lines": 1})))
            .await
            .unwrap();
        assert_eq!(head, json!("a\n"));

        let found = tb
            .dispatch("search_files", args(json!({"pattern": "*.py"})))
            .await
            .unwrap();
        assert_eq!(found, json!([root.join("custom_parsers/p.py").display().to_string()]));

        let err = tb
            .dispatch("write_file_content", args(json!({"file_path": "log_samples/x.py", "content": ""})))
            .await
            .unwrap_err();
        assert!(err.is_violation());
    }

    #[tokio::test]
    async fn test_schema_validate_and_persist() {
        let (_dir, root, tb) = toolbox();
        let text = json!({
            "index_name": "proxy",
            "total_logs_analyzed": 3,
            "analysis_batches_processed": 1,
            "log_types": {},
            "analysis_confidence": 0.7,
            "stopping_reason": "no-new-fields",
            "requires_human_review": false,
            "analysis_notes": "",
            "processing_time_minutes": 0.2
        })
        .to_string();

        let validated = tb
            .dispatch("parse_and_validate_schema_document", text.as_str().into())
            .await
            .unwrap();
        assert_eq!(validated["index_name"], "proxy");

        let written = tb
            .dispatch("persist_schema", args(json!({"text": text})))
            .await
            .unwrap();
        assert_eq!(written, json!(root.join("output/proxy_schema.json").display().to_string()));
    }

    #[tokio::test]
    async fn test_persist_schema_stays_inside_output_dir() {
        let (dir, root, tb) = toolbox();
        let text = json!({
            "index_name": "../../escaped",
            "total_logs_analyzed": 1,
            "analysis_batches_processed": 1,
            "log_types": {},
            "analysis_confidence": 0.5,
            "stopping_reason": "done",
            "requires_human_review": false,
            "analysis_notes": "",
            "processing_time_minutes": 0.1
        })
        .to_string();

        let err = tb
            .dispatch("persist_schema", args(json!({"text": text, "overwrite": true})))
            .await
            .unwrap_err();
        assert!(err.is_violation());
        assert!(!root.join("escaped_schema.json").exists());
        assert!(!dir.path().parent().unwrap().join("escaped_schema.json").exists());
        assert_eq!(fs::read_dir(root.join("output")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_safe_command_rejects_before_spawn() {
        let (_dir, _root, tb) = toolbox();

        let err = tb
            .dispatch("run_safe_command", args(json!({"command_type": "curl", "command_args": ["http://x"]})))
            .await
            .unwrap_err();
        assert!(err.is_violation());

        let err = tb
            .dispatch(
                "run_safe_command",
                args(json!({"command_type": "python", "command_args": ["-c", "print(1)"]})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Forbidden pattern '-c'"));
    }

    #[test]
    fn test_scan_counts_formats_and_closes_handle() {
        let (_dir, root, tb) = toolbox();
        let lines = [
            json!({"message_raw": "<190>date=2024-01-01 devname=fw1 action=accept"}),
            json!({"message_raw": "CEF:0|Vendor|Product|1.0|100|Blocked|5|src=10.0.0.1"}),
            json!({"message_raw": "{\"user\": \"bob\"}"}),
            json!({"message_raw": "<190>date=2024-01-02 devname=fw1 action=deny"}),
        ];
        let mut content: String = lines.iter().map(|l| format!("{}\n", l)).collect();
        content.push('\n');
        fs::write(root.join("log_samples/mixed.jsonl"), content).unwrap();

        let report = tb.scan_jsonl("log_samples/mixed.jsonl").unwrap();

        assert_eq!(report.lines, 4);
        assert_eq!(report.formats.get(&LogFormat::SyslogKv), Some(&2));
        assert_eq!(report.formats.get(&LogFormat::Cef), Some(&1));
        assert_eq!(report.formats.get(&LogFormat::Json), Some(&1));
        assert_eq!(report.sampled_format, LogFormat::SyslogKv);
        assert!(report.sampled_confidence > 0.5);
        assert!(report.finished_at >= report.started_at);
        assert!(tb.jsonl().registry().is_empty());
    }

    #[test]
    fn test_scan_samples_only_the_first_batch() {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let config = ToolsConfig {
            batch_size: 2,
            ..ToolsConfig::for_root(&root)
        };
        let tb = Toolbox::new(config);
        let body = "{\"a\": 1}\n{\"a\": 2}\n<13>k=v\n<13>k=w\n<13>k=x\n";
        fs::write(root.join("drift.jsonl"), body).unwrap();

        let report = tb.scan_jsonl("drift.jsonl").unwrap();
        assert_eq!(report.lines, 5);
        assert_eq!(report.formats.get(&LogFormat::SyslogKv), Some(&3));
        assert_eq!(report.sampled_format, LogFormat::Json);
    }

    #[test]
    fn test_scan_of_blank_file_has_no_sampled_format() {
        let (_dir, root, tb) = toolbox();
        fs::write(root.join("blank.jsonl"), "\n\n").unwrap();

        let report = tb.scan_jsonl("blank.jsonl").unwrap();
        assert_eq!(report.lines, 0);
        assert_eq!(report.sampled_format, LogFormat::Unknown);
    }

    #[test]
    fn test_scan_rejects_paths_outside_read_roots() {
        let (_dir, _root, tb) = toolbox();
        let err = tb.scan_jsonl("/etc/passwd.jsonl").unwrap_err();
        assert!(err.is_violation());
    }

    #[test]
    fn test_shutdown_closes_handles() {
        let (_dir, root, tb) = toolbox();
        fs::write(root.join("a.jsonl"), "{}\n").unwrap();
        tb.jsonl().open("a.jsonl").unwrap();
        tb.jsonl().open("a.jsonl").unwrap();
        assert_eq!(tb.jsonl().registry().len(), 2);

        tb.shutdown();
        assert!(tb.jsonl().registry().is_empty());
    }
}
