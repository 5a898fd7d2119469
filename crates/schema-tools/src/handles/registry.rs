use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::HandleError;

const JSONL_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    File,
}

/// An open stream owned by the registry. Dropping the entry closes the file.
#[derive(Debug)]
pub struct FileHandleEntry {
    pub id: String,
    pub kind: HandleKind,
    pub path: PathBuf,
    pub lines_read: u64,
    reader: BufReader<File>,
}

/// Serializable view of an entry, without the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: HandleKind,
    pub path: PathBuf,
    pub lines_read: u64,
}

/// Open JSONL streams keyed by generated id.
///
/// Each handle should be driven by one caller at a time. Reads on the same id
/// are serialized by the map's shard lock, so concurrent callers see batches
/// in some order but never a torn line.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: DashMap<String, FileHandleEntry>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` at offset 0 and register it under a fresh id.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<String, HandleError> {
        let path = path.as_ref();
        let is_jsonl = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(JSONL_EXTENSION));
        if !is_jsonl || !path.is_file() {
            return Err(HandleError::NotFound {
                path: path.display().to_string(),
            });
        }

        let file = File::open(path).map_err(|source| {
            tracing::error!("Error getting file handle for {}: {}", path.display(), source);
            HandleError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;

        let id = Uuid::new_v4().simple().to_string();
        let entry = FileHandleEntry {
            id: id.clone(),
            kind: HandleKind::File,
            path: path.to_path_buf(),
            lines_read: 0,
            reader: BufReader::new(file),
        };
        self.entries.insert(id.clone(), entry);
        tracing::debug!("Opened handle {} for {}", id, path.display());

        Ok(id)
    }

    /// Read up to `n` lines from the current position, newlines included.
    ///
    /// Returns fewer than `n` lines at end of file and an empty batch once the
    /// stream is exhausted. Invalid UTF-8 is replaced, never rejected.
    pub fn read(&self, id: &str, n: usize) -> Result<Vec<String>, HandleError> {
        if n < 1 {
            return Err(HandleError::InvalidBatchSize(n));
        }

        let mut entry = self.entries.get_mut(id).ok_or_else(|| HandleError::InvalidHandle {
            id: id.to_string(),
        })?;

        let mut lines = Vec::new();
        let mut buf = Vec::new();
        while lines.len() < n {
            buf.clear();
            let read = entry.reader.read_until(b'\n', &mut buf).map_err(|source| HandleError::Io {
                path: entry.path.display().to_string(),
                source,
            })?;
            if read == 0 {
                break;
            }
            lines.push(String::from_utf8_lossy(&buf).into_owned());
        }

        entry.lines_read += lines.len() as u64;
        Ok(lines)
    }

    /// Close the stream and forget the id. Closing twice is an error.
    pub fn close(&self, id: &str) -> Result<HandleInfo, HandleError> {
        let (_, entry) = self.entries.remove(id).ok_or_else(|| {
            tracing::error!("Handle entry with id {} not found", id);
            HandleError::InvalidHandle { id: id.to_string() }
        })?;
        tracing::debug!("Handle entry with id {} closed and removed", id);
        Ok(info_of(&entry))
    }

    pub fn info(&self, id: &str) -> Option<HandleInfo> {
        self.entries.get(id).map(|entry| info_of(&entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close every open stream.
    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("Registry cleared");
    }
}

fn info_of(entry: &FileHandleEntry) -> HandleInfo {
    HandleInfo {
        id: entry.id.clone(),
        kind: entry.kind,
        path: entry.path.clone(),
        lines_read: entry.lines_read,
    }
}
