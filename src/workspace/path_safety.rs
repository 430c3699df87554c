//! Confinement of action paths to the workspace root.
//!
//! Action paths are `/`-rooted workspace paths, not host paths: `/src/a.js`
//! names `{root}/src/a.js`. A `..` segment may not climb above the root,
//! and the deepest existing ancestor of the target is canonicalized so a
//! symlinked directory cannot redirect a write outside the workspace.

use std::path::{Path, PathBuf};

use crate::{AppError, Result};

/// Resolve the workspace path `path` to a host path under `workspace_root`.
///
/// Both `/` and `\` separate segments; empty and `.` segments are ignored.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if the root cannot be canonicalized,
/// if `..` segments climb above the root, or if an existing ancestor of
/// the target resolves outside the root.
pub fn resolve_path(workspace_root: &Path, path: &str) -> Result<PathBuf> {
    let root = workspace_root
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("workspace root invalid: {err}")))?;

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(AppError::PathViolation(format!(
                        "{path} climbs above the workspace root"
                    )));
                }
            }
            other if other.contains(':') && cfg!(windows) => {
                return Err(AppError::PathViolation(format!(
                    "{path} names a drive or stream"
                )));
            }
            other => segments.push(other),
        }
    }

    let target = segments.iter().fold(root.clone(), |acc, s| acc.join(s));
    ensure_contained(&root, &target, path)?;
    Ok(target)
}

/// Canonicalize the deepest existing ancestor of `target` and check that it
/// stays under `root`.
fn ensure_contained(root: &Path, target: &Path, original: &str) -> Result<()> {
    let Some(existing) = target.ancestors().find(|p| p.exists()) else {
        return Ok(());
    };
    let canonical = existing
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("cannot resolve {original}: {err}")))?;

    if canonical.starts_with(root) {
        Ok(())
    } else {
        Err(AppError::PathViolation(format!(
            "{original} resolves outside the workspace through a symlink"
        )))
    }
}
