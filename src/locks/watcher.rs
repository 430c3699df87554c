//! Hot-reload of the workspace lock file.
//!
//! [`LockWatcher`] watches the directory containing the lock file with
//! [`notify`] and, on every create/modify/remove event, reloads the file
//! and swaps the whole lock table of the shared [`LockCoordinator`].
//! Locks from configuration are merged back in on every reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::config::LockConfig;
use crate::locks::loader::LockFile;
use crate::locks::LockCoordinator;
use crate::{AppError, Result};

fn is_lock_file_change(event: &Event, lock_file: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| p.file_name() == lock_file.file_name())
}

/// Apply the lock file at `path` plus configured locks to `coordinator`.
pub fn apply_lock_file(coordinator: &LockCoordinator, path: &Path, base: &LockConfig) {
    let merged = LockFile::load(path).merged_with(&base.files, &base.folders);
    coordinator.replace_all(&merged.files, &merged.folders);
}

/// Keeps the lock table in sync with the lock file while alive.
pub struct LockWatcher {
    _watcher: RecommendedWatcher,
}

impl LockWatcher {
    /// Load the lock file once, then watch it for changes.
    ///
    /// The lock file's directory is created if missing so the watch can
    /// be installed before the file exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the directory cannot be created or
    /// the `notify` watcher cannot be installed.
    pub fn new(
        lock_file: &Path,
        coordinator: Arc<LockCoordinator>,
        base: LockConfig,
    ) -> Result<Self> {
        apply_lock_file(&coordinator, lock_file, &base);

        let watch_dir = lock_file
            .parent()
            .filter(|p| p != &Path::new(""))
            .ok_or_else(|| AppError::Config("lock file has no parent directory".into()))?;
        std::fs::create_dir_all(watch_dir).map_err(|err| {
            AppError::Config(format!(
                "failed to create lock directory {}: {err}",
                watch_dir.display()
            ))
        })?;

        let path_for_callback: PathBuf = lock_file.to_path_buf();
        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) if is_lock_file_change(&event, &path_for_callback) => {
                    apply_lock_file(&coordinator, &path_for_callback, &base);
                    info!(path = %path_for_callback.display(), "reloaded lock file");
                }
                Err(err) => warn!(%err, "lock file watcher error"),
                _ => {}
            },
        )
        .map_err(|err| AppError::Config(format!("failed to create lock file watcher: {err}")))?;

        watcher
            .watch(watch_dir, RecursiveMode::NonRecursive)
            .map_err(|err| {
                AppError::Config(format!(
                    "failed to watch lock directory '{}': {err}",
                    watch_dir.display()
                ))
            })?;

        info!(path = %lock_file.display(), "lock file watcher started");
        Ok(Self { _watcher: watcher })
    }
}
