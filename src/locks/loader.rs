//! Lock file loader.
//!
//! Parses the workspace lock file (`.artifact-runner/locks.json` by
//! default). On any read or parse problem the loader returns an empty
//! lock set and emits a tracing warning, so a broken lock file never
//! stops the runtime.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// On-disk lock file contents.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LockFile {
    /// Locked file paths.
    #[serde(default)]
    pub files: Vec<String>,
    /// Locked folders.
    #[serde(default)]
    pub folders: Vec<String>,
}

impl LockFile {
    /// Load the lock file at `path`.
    ///
    /// # Behaviour
    ///
    /// - **Missing file**: empty lock set.
    /// - **Unreadable, empty or malformed file**: empty lock set and a warning.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let raw = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read lock file, ignoring it");
                return Self::default();
            }
        };

        if raw.trim().is_empty() {
            return Self::default();
        }

        match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(err) => {
                warn!(path = %path.display(), %err, "malformed lock file, ignoring it");
                Self::default()
            }
        }
    }

    /// Merge with locks from configuration, which always apply.
    #[must_use]
    pub fn merged_with(mut self, files: &[String], folders: &[String]) -> Self {
        self.files.extend(files.iter().cloned());
        self.folders.extend(folders.iter().cloned());
        self
    }
}
