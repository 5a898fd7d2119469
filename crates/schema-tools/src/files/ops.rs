//! Guarded file operations.
//!
//! Reads must resolve under a read root, writes under a write root, and
//! searches under a search root. Every check happens before the filesystem
//! is touched.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

use crate::error::{Result, ToolError};
use crate::guard::PathGuard;

/// Read a file as text, optionally only its first `max_lines` lines.
pub fn read_file_content(guard: &PathGuard, path: impl AsRef<Path>, max_lines: Option<usize>) -> Result<String> {
    let path = path.as_ref();
    let resolved = guard.check_read(path)?;
    require_file(&resolved, path)?;

    let bytes = fs::read(&resolved)?;
    let text = String::from_utf8_lossy(&bytes);
    let content = match max_lines {
        Some(n) => text.split_inclusive('\n').take(n).collect(),
        None => text.into_owned(),
    };

    tracing::debug!("Read {} characters from {}", content.len(), path.display());
    Ok(content)
}

/// Write `content` to `path`, creating parent directories.
///
/// An existing file is only replaced when `overwrite` is set.
pub fn write_file_content(guard: &PathGuard, path: impl AsRef<Path>, content: &str, overwrite: bool) -> Result<PathBuf> {
    let path = path.as_ref();
    let resolved = guard.check_write(path)?;

    if resolved.exists() && !overwrite {
        return Err(ToolError::AlreadyExists(path.display().to_string()));
    }
    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&resolved, content)?;

    tracing::info!("Wrote {} characters to {}", content.len(), resolved.display());
    Ok(resolved)
}

/// Sorted entries of a directory, optionally filtered by a file-name glob.
pub fn list_directory_contents(
    guard: &PathGuard,
    directory: impl AsRef<Path>,
    pattern: Option<&str>,
    files_only: bool,
) -> Result<Vec<PathBuf>> {
    let directory = directory.as_ref();
    let resolved = guard.check_read(directory)?;
    if !resolved.exists() {
        return Err(ToolError::NotFound(directory.display().to_string()));
    }
    if !resolved.is_dir() {
        return Err(ToolError::InvalidArguments(format!(
            "Path is not a directory: {}",
            directory.display()
        )));
    }

    let matcher = pattern.map(compile_glob).transpose()?;
    let mut results = Vec::new();
    for entry in fs::read_dir(&resolved)? {
        let entry = entry?;
        let item = entry.path();
        if files_only && !item.is_file() {
            continue;
        }
        if let Some(matcher) = &matcher {
            if !matcher.is_match(entry.file_name()) {
                continue;
            }
        }
        results.push(item);
    }

    results.sort();
    tracing::debug!("Listed {} items in {}", results.len(), directory.display());
    Ok(results)
}

/// Recursively find files matching `pattern` under the search roots.
///
/// `search_dirs` narrows the search; entries outside `search_roots` are
/// skipped with a warning. Patterns without a `/` match file names, others
/// match the path relative to the directory being searched.
pub fn search_files(
    guard: &PathGuard,
    search_roots: &[PathBuf],
    pattern: &str,
    search_dirs: Option<&[PathBuf]>,
    max_results: usize,
) -> Result<Vec<PathBuf>> {
    let requested = search_dirs.unwrap_or(search_roots);
    let validated: Vec<PathBuf> = requested
        .iter()
        .filter_map(|dir| match guard.check_within(dir, search_roots) {
            Ok(resolved) => Some(resolved),
            Err(_) => {
                tracing::warn!("Search directory not allowed: {}", dir.display());
                None
            }
        })
        .collect();
    if validated.is_empty() {
        return Err(ToolError::InvalidArguments(format!(
            "No valid search directories provided. Allowed: {:?}",
            search_roots
        )));
    }

    let matcher = compile_glob(pattern)?;
    let match_relative = pattern.contains('/');
    let mut results = Vec::new();

    'dirs: for dir in &validated {
        if !dir.exists() {
            tracing::warn!("Directory does not exist: {}", dir.display());
            continue;
        }
        for entry in WalkDir::new(dir).follow_links(false).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let hit = if match_relative {
                entry
                    .path()
                    .strip_prefix(dir)
                    .is_ok_and(|relative| matcher.is_match(relative))
            } else {
                matcher.is_match(entry.file_name())
            };
            if hit && !results.contains(&entry.path().to_path_buf()) {
                results.push(entry.into_path());
                if results.len() >= max_results {
                    break 'dirs;
                }
            }
        }
    }

    tracing::info!("Found {} files matching pattern '{}'", results.len(), pattern);
    Ok(results)
}

/// Number of lines in a file; a final line without a newline still counts.
pub fn line_count(guard: &PathGuard, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let resolved = guard.check_read(path)?;
    require_file(&resolved, path)?;

    let mut reader = BufReader::new(fs::File::open(&resolved)?);
    let mut buf = Vec::new();
    let mut count = 0;
    while reader.read_until(b'\n', &mut buf)? > 0 {
        count += 1;
        buf.clear();
    }

    tracing::debug!("Counted {} lines in {}", count, path.display());
    Ok(count)
}

/// Write a JSON document verbatim after checking that it decodes.
pub fn write_json(guard: &PathGuard, json_data: &str, output_file: impl AsRef<Path>) -> Result<PathBuf> {
    serde_json::from_str::<serde_json::Value>(json_data)?;
    let written = write_file_content(guard, output_file, json_data, true)?;
    tracing::info!("JSON data written to {}", written.display());
    Ok(written)
}

fn require_file(resolved: &Path, requested: &Path) -> Result<()> {
    if !resolved.exists() {
        return Err(ToolError::NotFound(requested.display().to_string()));
    }
    if !resolved.is_file() {
        return Err(ToolError::InvalidArguments(format!(
            "Path is not a file: {}",
            requested.display()
        )));
    }
    Ok(())
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| ToolError::InvalidArguments(format!("Invalid glob pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Project {
        _dir: TempDir,
        root: PathBuf,
        guard: PathGuard,
    }

    fn project() -> Project {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("custom_parsers")).unwrap();
        fs::create_dir_all(root.join("log_samples/nested")).unwrap();
        fs::write(root.join("log_samples/a.jsonl"), "{}\n{}\n").unwrap();
        fs::write(root.join("log_samples/nested/b.jsonl"), "{}").unwrap();
        fs::write(root.join("log_samples/notes.txt"), "one\ntwo\nthree\n").unwrap();

        let guard = PathGuard::new(&root, vec![root.clone()], vec![root.join("custom_parsers")]);
        Project { _dir: dir, root, guard }
    }

    #[test]
    fn test_read_file_content() {
        let p = project();
        let content = read_file_content(&p.guard, "log_samples/notes.txt", None).unwrap();
        assert_eq!(content, "one\ntwo\nthree\n");

        let head = read_file_content(&p.guard, "log_samples/notes.txt", Some(2)).unwrap();
        assert_eq!(head, "one\ntwo\n");
    }

    #[test]
    fn test_read_errors() {
        let p = project();
        assert!(matches!(
            read_file_content(&p.guard, "missing.txt", None),
            Err(ToolError::NotFound(_))
        ));
        assert!(matches!(
            read_file_content(&p.guard, "log_samples", None),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(read_file_content(&p.guard, "/etc/hostname", None).unwrap_err().is_violation());
    }

    #[test]
    fn test_write_requires_write_root_and_overwrite() {
        let p = project();

        let written = write_file_content(&p.guard, "custom_parsers/new/parser.py", "x = 1\n", false).unwrap();
        assert_eq!(fs::read_to_string(&written).unwrap(), "x = 1\n");

        let err = write_file_content(&p.guard, "custom_parsers/new/parser.py", "x = 2\n", false).unwrap_err();
        assert!(err.to_string().contains("overwrite=true"));
        write_file_content(&p.guard, "custom_parsers/new/parser.py", "x = 2\n", true).unwrap();
        assert_eq!(fs::read_to_string(&written).unwrap(), "x = 2\n");

        let err = write_file_content(&p.guard, "log_samples/evil.py", "", true).unwrap_err();
        assert!(err.is_violation());
        assert!(!p.root.join("log_samples/evil.py").exists());
    }

    #[test]
    fn test_list_directory_contents() {
        let p = project();

        let all = list_directory_contents(&p.guard, "log_samples", None, false).unwrap();
        assert_eq!(all.len(), 3);
        let files = list_directory_contents(&p.guard, "log_samples", None, true).unwrap();
        assert_eq!(files.len(), 2);
        let jsonl = list_directory_contents(&p.guard, "log_samples", Some("*.jsonl"), false).unwrap();
        assert_eq!(jsonl, vec![p.root.join("log_samples/a.jsonl")]);
    }

    #[test]
    fn test_search_files_recursive_and_capped() {
        let p = project();
        let roots = vec![p.root.clone()];

        let found = search_files(&p.guard, &roots, "*.jsonl", None, 20).unwrap();
        assert_eq!(found.len(), 2);

        let capped = search_files(&p.guard, &roots, "*.jsonl", None, 1).unwrap();
        assert_eq!(capped.len(), 1);

        let nested = search_files(&p.guard, &roots, "**/nested/*.jsonl", None, 20).unwrap();
        assert_eq!(nested, vec![p.root.join("log_samples/nested/b.jsonl")]);
    }

    #[test]
    fn test_search_rejects_dirs_outside_roots() {
        let p = project();
        let roots = vec![p.root.join("log_samples")];
        let outside = vec![PathBuf::from("/")];

        let err = search_files(&p.guard, &roots, "*", Some(&outside), 20).unwrap_err();
        assert!(err.to_string().contains("No valid search directories"));
    }

    #[test]
    fn test_line_count() {
        let p = project();
        assert_eq!(line_count(&p.guard, "log_samples/a.jsonl").unwrap(), 2);
        assert_eq!(line_count(&p.guard, "log_samples/nested/b.jsonl").unwrap(), 1);
    }

    #[test]
    fn test_write_json_validates_payload() {
        let p = project();
        assert!(matches!(
            write_json(&p.guard, "{not json", "custom_parsers/out.json"),
            Err(ToolError::Serialization(_))
        ));
        let path = write_json(&p.guard, r#"{"ok": true}"#, "custom_parsers/out.json").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), r#"{"ok": true}"#);
    }
}
