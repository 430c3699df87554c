//! File lock coordination.
//!
//! A [`LockCoordinator`] answers whether a workspace path is
//! write-protected. Locks are either exact file paths or folders; a
//! locked folder protects every descendant. Lock state changes only
//! through the explicit `lock_*` / `unlock_*` / [`LockCoordinator::replace_all`]
//! operations (user actions, the lock file watcher). The action runner
//! only ever calls [`LockCoordinator::is_locked`].

pub mod loader;
pub mod watcher;

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

use crate::config::LockConfig;
use crate::models::normalize_path;

/// Answer to a lock query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockStatus {
    /// Whether the path must not be written.
    pub locked: bool,
    /// The locked folder that covers the path, when the lock is inherited.
    pub locked_by_folder: Option<String>,
}

impl LockStatus {
    fn unlocked() -> Self {
        Self::default()
    }
}

/// Current lock table, for display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockSnapshot {
    /// Locked file paths, sorted.
    pub files: Vec<String>,
    /// Locked folders, sorted.
    pub folders: Vec<String>,
}

#[derive(Debug, Default)]
struct LockTable {
    files: BTreeSet<String>,
    folders: BTreeSet<String>,
}

/// Read-mostly registry of locked paths.
#[derive(Debug, Default)]
pub struct LockCoordinator {
    table: RwLock<LockTable>,
}

impl LockCoordinator {
    /// Create a coordinator with no locks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator seeded from configuration.
    #[must_use]
    pub fn from_config(config: &LockConfig) -> Self {
        let coordinator = Self::new();
        coordinator.replace_all(&config.files, &config.folders);
        coordinator
    }

    /// Report whether `path` is locked, directly or through a folder.
    #[must_use]
    pub fn is_locked(&self, path: &str) -> LockStatus {
        let path = normalize_path(path);
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);

        if table.files.contains(&path) {
            return LockStatus {
                locked: true,
                locked_by_folder: None,
            };
        }

        let mut candidate = path.as_str();
        loop {
            if table.folders.contains(candidate) {
                return LockStatus {
                    locked: true,
                    locked_by_folder: Some(candidate.to_owned()),
                };
            }
            match candidate.rfind('/') {
                Some(0) if candidate.len() > 1 => candidate = "/",
                Some(idx) if idx > 0 => candidate = &candidate[..idx],
                _ => return LockStatus::unlocked(),
            }
        }
    }

    /// Lock a single file. Returns `false` if it was already locked.
    pub fn lock_file(&self, path: &str) -> bool {
        self.write().files.insert(normalize_path(path))
    }

    /// Unlock a single file. Returns `false` if it was not locked.
    pub fn unlock_file(&self, path: &str) -> bool {
        self.write().files.remove(&normalize_path(path))
    }

    /// Lock a folder and everything below it. Returns `false` if already locked.
    pub fn lock_folder(&self, path: &str) -> bool {
        self.write().folders.insert(normalize_path(path))
    }

    /// Unlock a folder. Returns `false` if it was not locked.
    ///
    /// Locks on individual files below the folder are kept.
    pub fn unlock_folder(&self, path: &str) -> bool {
        self.write().folders.remove(&normalize_path(path))
    }

    /// Replace the whole lock table in one step.
    pub fn replace_all(&self, files: &[String], folders: &[String]) {
        let table = LockTable {
            files: files.iter().map(|p| normalize_path(p)).collect(),
            folders: folders.iter().map(|p| normalize_path(p)).collect(),
        };
        *self.write() = table;
    }

    /// Copy of the current lock table.
    #[must_use]
    pub fn locked_paths(&self) -> LockSnapshot {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        LockSnapshot {
            files: table.files.iter().cloned().collect(),
            folders: table.folders.iter().cloned().collect(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, LockTable> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}
