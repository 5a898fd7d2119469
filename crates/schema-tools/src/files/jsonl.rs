use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::guard::PathGuard;
use crate::handles::{HandleInfo, HandleRegistry};

/// Field that carries the raw log line inside a JSONL record
pub const RAW_MESSAGE_FIELD: &str = "message_raw";

/// Paging access to JSONL files under the read roots.
#[derive(Debug, Clone)]
pub struct JsonlFiles {
    registry: Arc<HandleRegistry>,
    guard: PathGuard,
}

impl JsonlFiles {
    pub fn new(registry: Arc<HandleRegistry>, guard: PathGuard) -> Self {
        Self { registry, guard }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Check the path against the read roots, then open a handle on it.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<String> {
        let resolved = self.guard.check_read(path)?;
        let id = self.registry.open(&resolved)?;
        tracing::info!("Opened JSONL handle {} for {}", id, resolved.display());
        Ok(id)
    }

    pub fn read(&self, id: &str, number_of_lines: usize) -> Result<Vec<String>> {
        Ok(self.registry.read(id, number_of_lines)?)
    }

    pub fn close(&self, id: &str) -> Result<HandleInfo> {
        let info = self.registry.close(id)?;
        tracing::info!("Closed JSONL handle {} after {} lines", id, info.lines_read);
        Ok(info)
    }
}

/// The text a format parser should see for one JSONL line.
///
/// Records that carry a string `message_raw` field yield that field; any other
/// line is returned trimmed as-is.
pub fn raw_message(line: &str) -> String {
    let trimmed = line.trim();
    if let Ok(Value::Object(record)) = serde_json::from_str::<Value>(trimmed) {
        if let Some(Value::String(raw)) = record.get(RAW_MESSAGE_FIELD) {
            return raw.clone();
        }
    }
    trimmed.to_string()
}
