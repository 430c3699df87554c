//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering parser, runner, and workspace failure modes.
///
/// Every payload is owned text so an error can be stored on an action
/// record and handed to a display layer without borrowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// File system path failed validation against workspace root.
    PathViolation(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// The workspace collaborator rejected or failed an operation.
    Workspace(String),
    /// A tag header could not be interpreted; the parser passes it through as text.
    MalformedTag(String),
    /// An action declared a `type` the runner does not know how to execute.
    UnknownActionKind(String),
    /// A file action targeted a locked path; nothing was written.
    LockedPath(String),
    /// A shell command exited with a non-zero status.
    ShellExecution {
        /// Process exit code (`-1` when the process was killed by a signal).
        exit_code: i32,
        /// Captured standard error output.
        stderr: String,
    },
    /// An action exceeded its execution timeout.
    Timeout(String),
    /// An action was cancelled before it started.
    Aborted(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::PathViolation(msg) => write!(f, "path violation: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Workspace(msg) => write!(f, "workspace: {msg}"),
            Self::MalformedTag(msg) => write!(f, "malformed tag: {msg}"),
            Self::UnknownActionKind(kind) => write!(f, "unknown action kind: {kind}"),
            Self::LockedPath(path) => write!(f, "locked path: {path}"),
            Self::ShellExecution { exit_code, stderr } => {
                write!(f, "shell execution failed with exit code {exit_code}")?;
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Aborted(msg) => write!(f, "aborted: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
