//! Path containment checks.
//!
//! Targets are resolved component by component: symlinks are followed,
//! `..` pops the resolved parent, and components that do not exist yet are
//! kept as written. Roots must exist and are canonicalized strictly.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::Violation;

/// Same limit as Linux `MAXSYMLINKS`
const MAX_SYMLINK_HOPS: usize = 40;

/// True iff the resolved `path` equals or descends from a resolved root.
///
/// Relative paths are resolved against the process working directory.
pub fn is_allowed(path: impl AsRef<Path>, allowed_roots: &[PathBuf]) -> Result<bool, Violation> {
    let base = std::env::current_dir().map_err(|e| Violation::InvalidPath {
        path: path.as_ref().display().to_string(),
        reason: format!("cannot read working directory: {}", e),
    })?;
    let resolved = resolve_from(&base, path.as_ref())?;
    Ok(contained_in(&resolved, allowed_roots))
}

/// Resolve `path` to an absolute path without requiring it to exist.
///
/// Relative paths are joined onto `base` first; an empty path is `base`.
pub fn resolve_from(base: &Path, path: &Path) -> Result<PathBuf, Violation> {
    let invalid = |reason: &str| Violation::InvalidPath {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    if path.to_string_lossy().contains('\0') {
        return Err(invalid("embedded NUL byte"));
    }

    let absolute = if path.as_os_str().is_empty() {
        base.to_path_buf()
    } else if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut pending: VecDeque<Segment> = segments(&absolute).into();
    let mut resolved = PathBuf::new();
    let mut hops = 0;

    while let Some(segment) = pending.pop_front() {
        match segment {
            // Pushing an absolute component replaces what was resolved so far
            Segment::Root(root) => resolved.push(root),
            Segment::Parent => {
                resolved.pop();
            }
            Segment::Name(name) => {
                let candidate = resolved.join(&name);
                let is_link = fs::symlink_metadata(&candidate)
                    .map(|meta| meta.file_type().is_symlink())
                    .unwrap_or(false);

                if !is_link {
                    resolved = candidate;
                    continue;
                }

                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(invalid("too many levels of symbolic links"));
                }
                let target = fs::read_link(&candidate)
                    .map_err(|e| invalid(&format!("cannot read link {}: {}", candidate.display(), e)))?;
                // Relative link targets resolve against the link's directory,
                // which is exactly what `resolved` holds right now.
                for segment in segments(&target).into_iter().rev() {
                    pending.push_front(segment);
                }
            }
        }
    }

    Ok(resolved)
}

/// Canonicalize roots, skipping any that cannot be resolved.
pub fn canonical_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .filter_map(|root| match fs::canonicalize(root) {
            Ok(canonical) => Some(canonical),
            Err(e) => {
                tracing::warn!("Error resolving allowed directory '{}': {}", root.display(), e);
                None
            }
        })
        .collect()
}

fn contained_in(resolved: &Path, roots: &[PathBuf]) -> bool {
    canonical_roots(roots)
        .iter()
        .any(|root| resolved.starts_with(root))
}

enum Segment {
    Root(OsString),
    Parent,
    Name(OsString),
}

fn segments(path: &Path) -> Vec<Segment> {
    path.components()
        .filter_map(|component| match component {
            Component::Prefix(_) | Component::RootDir => {
                Some(Segment::Root(component.as_os_str().to_os_string()))
            }
            Component::CurDir => None,
            Component::ParentDir => Some(Segment::Parent),
            Component::Normal(name) => Some(Segment::Name(name.to_os_string())),
        })
        .collect()
}

/// Read and write containment for one project.
#[derive(Debug, Clone)]
pub struct PathGuard {
    base: PathBuf,
    read_roots: Vec<PathBuf>,
    write_roots: Vec<PathBuf>,
}

impl PathGuard {
    /// `base` anchors relative paths handed to the guard.
    pub fn new(base: impl Into<PathBuf>, read_roots: Vec<PathBuf>, write_roots: Vec<PathBuf>) -> Self {
        Self {
            base: base.into(),
            read_roots,
            write_roots,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn read_roots(&self) -> &[PathBuf] {
        &self.read_roots
    }

    pub fn write_roots(&self) -> &[PathBuf] {
        &self.write_roots
    }

    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, Violation> {
        resolve_from(&self.base, path.as_ref())
    }

    /// Resolve `path` and require it to sit under a read root.
    pub fn check_read(&self, path: impl AsRef<Path>) -> Result<PathBuf, Violation> {
        self.check(path.as_ref(), &self.read_roots, "read")
    }

    /// Resolve `path` and require it to sit under a write root.
    pub fn check_write(&self, path: impl AsRef<Path>) -> Result<PathBuf, Violation> {
        self.check(path.as_ref(), &self.write_roots, "write")
    }

    /// Check against an arbitrary root set, e.g. the search directories.
    pub fn check_within(&self, path: impl AsRef<Path>, roots: &[PathBuf]) -> Result<PathBuf, Violation> {
        self.check(path.as_ref(), roots, "search")
    }

    fn check(&self, path: &Path, roots: &[PathBuf], access: &'static str) -> Result<PathBuf, Violation> {
        let resolved = self.resolve(path)?;
        if contained_in(&resolved, roots) {
            Ok(resolved)
        } else {
            tracing::warn!("Rejected {} access to {}", access, path.display());
            Err(Violation::PathNotAllowed {
                path: path.display().to_string(),
                access,
            })
        }
    }
}
