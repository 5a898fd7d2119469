use std::fs;
use std::path::{Path, PathBuf};

use super::model::SchemaDocument;
use crate::error::{Result, SchemaError, ToolError, Violation};
use crate::guard::PathGuard;

/// Write `document` as pretty JSON to `<output_dir>/<index_name>_schema.json`.
///
/// The index name must be a plain file name and the final path must pass the
/// guard's write check. Whole-file overwrite; an existing artifact is only
/// replaced when `overwrite` is set.
pub fn persist_schema(
    guard: &PathGuard,
    document: &SchemaDocument,
    output_dir: &Path,
    overwrite: bool,
) -> Result<PathBuf> {
    let index = document.index_name.as_str();
    let plain = !index.is_empty()
        && index.trim() == index
        && !index.contains(['/', '\\'])
        && index != "."
        && index != "..";
    if !plain {
        return Err(Violation::InvalidPath {
            path: index.to_string(),
            reason: "index_name must be a plain file name".to_string(),
        }
        .into());
    }

    let output_file = guard.check_write(output_dir.join(document.file_name()))?;
    if output_file.exists() && !overwrite {
        tracing::warn!(
            "Output file already exists and overwrite not set: {}",
            output_file.display()
        );
        return Err(ToolError::AlreadyExists(output_file.display().to_string()));
    }

    let body = serde_json::to_string_pretty(document)?;
    let parent = output_file.parent().unwrap_or(output_dir);
    fs::create_dir_all(parent)
        .and_then(|_| fs::write(&output_file, body))
        .map_err(|source| SchemaError::Write {
            path: output_file.display().to_string(),
            source,
        })?;

    tracing::info!("Output saved to: {}", output_file.display());
    Ok(output_file)
}
