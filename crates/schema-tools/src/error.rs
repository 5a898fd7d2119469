//! Error types shared by the tool layer.
//!
//! - [`Violation`]: security-policy rejections, raised before any I/O or spawn
//! - [`HandleError`]: misuse of the streaming handle registry
//! - [`ExecError`]: a validated command failed to run to completion
//! - [`SchemaError`]: a schema document failed to decode or validate
//!
//! Parser errors live with the parsers in [`crate::parser::ParseError`].

use std::time::Duration;
use thiserror::Error;

use crate::parser::ParseError;

/// Policy violation. The request was rejected before touching the filesystem
/// or spawning anything.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The path string cannot be resolved at all (e.g. embedded NUL)
    #[error("Invalid path: {path} ({reason})")]
    InvalidPath { path: String, reason: String },

    #[error("Access denied: path '{path}' is outside the allowed {access} directories")]
    PathNotAllowed { path: String, access: &'static str },

    #[error("Command type '{command}' not allowed. Allowed: {allowed:?}")]
    UnknownCommand { command: String, allowed: Vec<String> },

    #[error("Forbidden pattern '{pattern}' found in arguments for {command}")]
    ForbiddenPattern { command: String, pattern: String },

    #[error("Argument '{arg}' not allowed for {command}. Allowed: {allowed:?}")]
    ArgumentNotAllowed {
        command: String,
        arg: String,
        allowed: Vec<String>,
    },

    #[error("File path in arguments not allowed: {arg}")]
    ArgumentPathNotAllowed { arg: String },

    #[error("Working directory not allowed: {path}")]
    WorkingDirectoryForbidden { path: String },
}

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("File not found or not .jsonl: {path}")]
    NotFound { path: String },

    #[error("Invalid or expired handle: {id}")]
    InvalidHandle { id: String },

    #[error("Number of lines must be greater than 0, got {0}")]
    InvalidBatchSize(usize),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The command passed validation but did not run to completion.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Wall-clock limit hit; the child was killed
    #[error("Command timed out after {} seconds", .limit.as_secs())]
    Timeout { limit: Duration },

    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Error running command: {reason}")]
    Io { reason: String },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema text is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Schema is not a valid dictionary, got {0}")]
    NotAnObject(&'static str),

    /// Every violation found, in document order
    #[error("schema validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Failed to write schema to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error returned by the toolbox.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Violation(#[from] Violation),

    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File already exists: {0}. Set overwrite=true to replace it")]
    AlreadyExists(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// True for rejections by the path or command policy.
    pub fn is_violation(&self) -> bool {
        matches!(self, ToolError::Violation(_))
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;
