//! Model: ToolsConfig and its derived directory sets.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Directory and limit settings for the tool layer.
///
/// Empty directory lists mean "derive from `project_root`"; see
/// [`ToolsConfig::resolve_defaults`]. Relative entries are taken relative to
/// `project_root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub project_root: PathBuf,
    /// First entry is the default working directory for commands
    pub read_dirs: Vec<PathBuf>,
    pub write_dirs: Vec<PathBuf>,
    pub search_dirs: Vec<PathBuf>,
    /// Where schema artifacts are written; always a write root
    pub output_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub command_timeout_secs: u64,
    pub max_search_results: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            read_dirs: Vec::new(),
            write_dirs: Vec::new(),
            search_dirs: Vec::new(),
            output_dir: None,
            batch_size: 50,
            command_timeout_secs: 30,
            max_search_results: 20,
        }
    }
}

impl ToolsConfig {
    /// Defaults for `root` with every directory list filled in.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            project_root: root.into(),
            ..Self::default()
        };
        config.resolve_defaults();
        config
    }

    /// Make `project_root` absolute, fill empty directory lists from it and
    /// anchor relative entries to it.
    pub fn resolve_defaults(&mut self) {
        if self.project_root.is_relative() {
            match std::env::current_dir() {
                Ok(cwd) => self.project_root = absolute_from(&cwd, &self.project_root),
                Err(e) => tracing::warn!(
                    "Cannot resolve project_root {} against the working directory: {}",
                    self.project_root.display(),
                    e
                ),
            }
        }
        let root = self.project_root.clone();

        if self.read_dirs.is_empty() {
            self.read_dirs = vec![root.clone()];
        }
        if self.write_dirs.is_empty() {
            self.write_dirs = vec![root.join("custom_parsers"), root.join("tests").join("custom_parsers")];
        }
        if self.search_dirs.is_empty() {
            self.search_dirs = vec![root.clone(), root.join("log_samples"), root.join("examples")];
        }
        if self.output_dir.is_none() {
            self.output_dir = Some(root.join("output"));
        }

        for dir in self
            .read_dirs
            .iter_mut()
            .chain(self.write_dirs.iter_mut())
            .chain(self.search_dirs.iter_mut())
            .chain(self.output_dir.iter_mut())
        {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.project_root.join("output"))
    }

    /// `write_dirs` plus the output directory.
    pub fn write_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.write_dirs.clone();
        let output = self.output_dir();
        if !roots.contains(&output) {
            roots.push(output);
        }
        roots
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.read_dirs.is_empty() {
            return Err("read_dirs must contain at least one directory".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }
        if self.command_timeout_secs == 0 {
            return Err("command_timeout_secs must be > 0".to_string());
        }
        if self.max_search_results == 0 {
            return Err("max_search_results must be > 0".to_string());
        }
        validate_dir(&self.project_root, "project_root")?;
        Ok(())
    }
}

/// `cwd` joined with `path`, without `.` components.
fn absolute_from(cwd: &Path, path: &Path) -> PathBuf {
    cwd.join(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn validate_dir(path: &Path, name: &str) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err(format!("{} is not configured (empty path)", name));
    }
    if !path.is_dir() {
        return Err(format!("{} is not a directory: {}", name, path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Defaults ─────────────────────────────────────────────────

    #[test]
    fn test_default_limits() {
        let cfg = ToolsConfig::default();
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.command_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.max_search_results, 20);
    }

    #[test]
    fn test_for_root_derives_directories() {
        let cfg = ToolsConfig::for_root("/srv/project");
        let root = PathBuf::from("/srv/project");

        assert_eq!(cfg.read_dirs, vec![root.clone()]);
        assert_eq!(
            cfg.write_dirs,
            vec![root.join("custom_parsers"), root.join("tests/custom_parsers")]
        );
        assert_eq!(
            cfg.search_dirs,
            vec![root.clone(), root.join("log_samples"), root.join("examples")]
        );
        assert_eq!(cfg.output_dir(), root.join("output"));
    }

    #[test]
    fn test_relative_entries_anchor_to_root() {
        let mut cfg = ToolsConfig {
            project_root: PathBuf::from("/srv/project"),
            read_dirs: vec![PathBuf::from("data"), PathBuf::from("/abs")],
            output_dir: Some(PathBuf::from("results")),
            ..ToolsConfig::default()
        };
        cfg.resolve_defaults();

        assert_eq!(cfg.read_dirs, vec![PathBuf::from("/srv/project/data"), PathBuf::from("/abs")]);
        assert_eq!(cfg.output_dir(), PathBuf::from("/srv/project/results"));
    }

    #[test]
    fn test_relative_project_root_becomes_absolute() {
        let cwd = std::env::current_dir().unwrap();

        let cfg = ToolsConfig::for_root(".");
        assert_eq!(cfg.project_root, cwd);
        assert_eq!(cfg.read_dirs, vec![cwd.clone()]);
        assert_eq!(cfg.output_dir(), cwd.join("output"));

        let cfg = ToolsConfig::for_root("./project");
        assert_eq!(cfg.project_root, cwd.join("project"));
    }

    #[test]
    fn test_write_roots_include_output_once() {
        let cfg = ToolsConfig::for_root("/srv/project");
        let roots = cfg.write_roots();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[2], PathBuf::from("/srv/project/output"));
    }

    // ── Validation ───────────────────────────────────────────────

    #[test]
    fn test_validate_rejects_zero_limits() {
        let root = std::env::temp_dir();
        for (name, cfg) in [
            ("batch_size", ToolsConfig { batch_size: 0, ..ToolsConfig::for_root(&root) }),
            ("command_timeout_secs", ToolsConfig { command_timeout_secs: 0, ..ToolsConfig::for_root(&root) }),
            ("max_search_results", ToolsConfig { max_search_results: 0, ..ToolsConfig::for_root(&root) }),
            ("read_dirs", ToolsConfig { read_dirs: vec![], ..ToolsConfig::for_root(&root) }),
        ] {
            let err = cfg.validate().unwrap_err();
            assert!(err.contains(name), "Error should mention {}: {}", name, err);
        }
        assert!(ToolsConfig::for_root(&root).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let cfg = ToolsConfig::for_root("/definitely/not/a/real/root");
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("project_root"));
    }

    // ── Serialization ────────────────────────────────────────────

    #[test]
    fn test_deserialize_partial_toml() {
        let toml_str = r#"
            project_root = "/srv/project"
            batch_size = 10
        "#;
        let mut cfg: ToolsConfig = toml::from_str(toml_str).expect("Should accept partial TOML");
        cfg.resolve_defaults();
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.command_timeout_secs, 30);
        assert_eq!(cfg.read_dirs, vec![PathBuf::from("/srv/project")]);
    }

    #[test]
    fn test_toml_round_trip() {
        let cfg = ToolsConfig::for_root("/srv/project");
        let toml_str = toml::to_string(&cfg).expect("Should serialize to TOML");
        let back: ToolsConfig = toml::from_str(&toml_str).expect("Should deserialize from TOML");
        assert_eq!(back, cfg);
    }
}
