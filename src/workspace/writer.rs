//! Atomic file writes for file actions.
//!
//! The body is staged in a hidden temporary file next to the target and
//! renamed over it, so a concurrent reader (or a dev server watching the
//! tree) sees the previous file or the complete new one.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder;

use crate::workspace::path_safety::resolve_path;
use crate::{AppError, Result};

const STAGING_PREFIX: &str = ".artifact-runner-";

/// Outcome of a completed write.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// Host path of the written file.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes_written: usize,
}

/// Write `content` to the workspace path `path` under `workspace_root`.
///
/// The parent directory must already exist; the runner creates it first.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if the path leaves the workspace, and
/// `AppError::Io` if staging, writing or renaming fails.
pub fn write_atomic(workspace_root: &Path, path: &str, content: &str) -> Result<WriteSummary> {
    let target = resolve_path(workspace_root, path)?;
    if target.is_dir() {
        return Err(AppError::Io(format!("{path} is a directory")));
    }
    let parent = target
        .parent()
        .ok_or_else(|| AppError::Io(format!("{path} has no parent directory")))?;

    let mut staged = Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(parent)
        .map_err(|err| AppError::Io(format!("failed to stage {path}: {err}")))?;
    staged
        .write_all(content.as_bytes())
        .and_then(|()| staged.flush())
        .map_err(|err| AppError::Io(format!("failed to write {path}: {err}")))?;

    staged
        .persist(&target)
        .map_err(|err| AppError::Io(format!("failed to replace {path}: {}", err.error)))?;

    Ok(WriteSummary {
        path: target,
        bytes_written: content.len(),
    })
}
