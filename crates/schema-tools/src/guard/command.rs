//! Whitelisted command execution.
//!
//! Only a handful of developer tools may be invoked, each with a fixed set of
//! flags and a list of substrings that are never allowed anywhere in the
//! argument string. Validation always finishes before anything is spawned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::exec::{CommandOutput, PreparedCommand};
use super::paths::{canonical_roots, resolve_from};
use crate::error::{ToolError, Violation};

/// Extensions that mark an argument as a file path
const PATH_EXTENSIONS: [&str; 4] = [".py", ".jsonl", ".json", ".txt"];

/// Flag whose following argument is a free-form test selector
const SELECTOR_FLAG: &str = "-k";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Policy entry for one command type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub executable: String,
    /// Exact flags, also accepted as `flag=value`
    pub allowed_args: Vec<String>,
    /// Informational; positional paths are validated but never required
    pub requires_path_arg: bool,
    pub forbidden_patterns: Vec<String>,
}

impl CommandSpec {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            allowed_args: Vec::new(),
            requires_path_arg: false,
            forbidden_patterns: Vec::new(),
        }
    }

    pub fn allowed_args(mut self, args: &[&str]) -> Self {
        self.allowed_args.extend(args.iter().map(|a| a.to_string()));
        self
    }

    pub fn forbidden_patterns(mut self, patterns: &[&str]) -> Self {
        self.forbidden_patterns.extend(patterns.iter().map(|p| p.to_string()));
        self
    }

    pub fn requires_path_arg(mut self, required: bool) -> Self {
        self.requires_path_arg = required;
        self
    }

    fn allows_flag(&self, arg: &str) -> bool {
        self.allowed_args.iter().any(|allowed| {
            arg == allowed
                || arg
                    .strip_prefix(allowed.as_str())
                    .is_some_and(|rest| rest.starts_with('='))
        })
    }
}

/// Fixed mapping of command type to [`CommandSpec`], plus the read roots
/// that path arguments and working directories must stay inside.
#[derive(Debug, Clone)]
pub struct CommandAllowlist {
    commands: BTreeMap<String, CommandSpec>,
    read_roots: Vec<PathBuf>,
    default_timeout: Duration,
}

impl CommandAllowlist {
    /// Empty allowlist; add entries with [`allow`](Self::allow).
    pub fn new(read_roots: Vec<PathBuf>) -> Self {
        Self {
            commands: BTreeMap::new(),
            read_roots,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The test runner, the interpreter (compile checks only), the formatter
    /// and the linter.
    pub fn standard(read_roots: Vec<PathBuf>) -> Self {
        Self::new(read_roots)
            .allow(
                "pytest",
                CommandSpec::new("pytest")
                    .allowed_args(&["--version", "-v", "--verbose", "-x", "--tb=short", "--tb=long", "-k"])
                    .requires_path_arg(true),
            )
            .allow(
                "python",
                CommandSpec::new("python")
                    .allowed_args(&["--version", "-m", "py_compile"])
                    .forbidden_patterns(&["-c", "--command", "exec", "eval", "os.system", "subprocess"]),
            )
            .allow(
                "black",
                CommandSpec::new("black")
                    .allowed_args(&["--version", "--check", "--diff", "--line-length"])
                    .requires_path_arg(true),
            )
            .allow(
                "ruff",
                CommandSpec::new("ruff").allowed_args(&["--version", "check"]),
            )
    }

    pub fn allow(mut self, command_type: impl Into<String>, spec: CommandSpec) -> Self {
        self.commands.insert(command_type.into(), spec);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn command_types(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn spec(&self, command_type: &str) -> Option<&CommandSpec> {
        self.commands.get(command_type)
    }

    /// Validate a request and produce a command ready to spawn.
    ///
    /// Checks run in order: known command type, forbidden substrings in the
    /// space-joined arguments, per-argument shape, working directory, then
    /// containment of path-like arguments. Relative path arguments are
    /// resolved against the effective working directory.
    pub fn prepare(
        &self,
        command_type: &str,
        args: &[String],
        working_directory: Option<&Path>,
    ) -> Result<PreparedCommand, Violation> {
        let spec = self.commands.get(command_type).ok_or_else(|| Violation::UnknownCommand {
            command: command_type.to_string(),
            allowed: self.command_types(),
        })?;

        let joined = args.join(" ");
        if let Some(pattern) = spec.forbidden_patterns.iter().find(|p| joined.contains(p.as_str())) {
            tracing::warn!("Rejected {} invocation: forbidden pattern '{}'", command_type, pattern);
            return Err(Violation::ForbiddenPattern {
                command: command_type.to_string(),
                pattern: pattern.clone(),
            });
        }

        for (idx, arg) in args.iter().enumerate() {
            let follows_selector = idx > 0 && args[idx - 1] == SELECTOR_FLAG;
            if looks_like_path(arg) || is_numeric(arg) || follows_selector || spec.allows_flag(arg) {
                continue;
            }
            tracing::warn!("Rejected {} invocation: argument '{}'", command_type, arg);
            return Err(Violation::ArgumentNotAllowed {
                command: command_type.to_string(),
                arg: arg.clone(),
                allowed: spec.allowed_args.clone(),
            });
        }

        let roots = canonical_roots(&self.read_roots);
        let cwd = match working_directory {
            Some(dir) => {
                let resolved = resolve_from(&self.default_cwd()?, dir)?;
                if !roots.iter().any(|root| resolved.starts_with(root)) {
                    return Err(Violation::WorkingDirectoryForbidden {
                        path: dir.display().to_string(),
                    });
                }
                resolved
            }
            None => self.default_cwd()?,
        };

        for arg in args.iter().filter(|arg| looks_like_path(arg)) {
            let resolved = resolve_from(&cwd, Path::new(arg))?;
            if !roots.iter().any(|root| resolved.starts_with(root)) {
                return Err(Violation::ArgumentPathNotAllowed { arg: arg.clone() });
            }
        }

        Ok(PreparedCommand {
            program: spec.executable.clone(),
            args: args.to_vec(),
            cwd,
        })
    }

    /// Validate, then run with `timeout` (or the allowlist default).
    pub async fn validate_and_run(
        &self,
        command_type: &str,
        args: &[String],
        timeout: Option<Duration>,
        working_directory: Option<&Path>,
    ) -> Result<CommandOutput, ToolError> {
        let prepared = self.prepare(command_type, args, working_directory)?;
        let output = prepared.run(timeout.unwrap_or(self.default_timeout)).await?;
        Ok(output)
    }

    fn default_cwd(&self) -> Result<PathBuf, Violation> {
        self.read_roots
            .first()
            .cloned()
            .ok_or_else(|| Violation::WorkingDirectoryForbidden {
                path: "<no allowed read directories configured>".to_string(),
            })
    }
}

fn looks_like_path(arg: &str) -> bool {
    arg.contains('/') || PATH_EXTENSIONS.iter().any(|ext| arg.ends_with(ext))
}

fn is_numeric(arg: &str) -> bool {
    !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit())
}
