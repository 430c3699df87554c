//! Runtime configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::{AppError, Result};

/// Locks applied at startup, before any lock file is read.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LockConfig {
    /// Exact file paths that actions must not write.
    #[serde(default)]
    pub files: Vec<String>,
    /// Folders whose descendants actions must not write.
    #[serde(default)]
    pub folders: Vec<String>,
}

fn default_action_timeout() -> u64 {
    120
}

fn default_start_detect() -> u64 {
    30
}

fn default_hidden_files() -> Vec<String> {
    vec![
        r"/node_modules/".into(),
        r"/\.next".into(),
        r"/\.astro".into(),
    ]
}

fn default_lock_file() -> PathBuf {
    PathBuf::from(".artifact-runner/locks.json")
}

/// Runtime configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RuntimeConfig {
    /// Directory that file actions write into and commands run in.
    pub workspace_root: PathBuf,
    /// Upper bound for a single action; 0 means no timeout.
    #[serde(default = "default_action_timeout")]
    pub action_timeout_seconds: u64,
    /// How long a `start` action waits for the process to announce a URL.
    #[serde(default = "default_start_detect")]
    pub start_detect_seconds: u64,
    /// Reset the parser and re-parse every message once streaming ends.
    #[serde(default)]
    pub reprocess_finished_messages: bool,
    /// Regex patterns for paths left out of the file tree listing.
    #[serde(default = "default_hidden_files")]
    pub hidden_files: Vec<String>,
    /// Locks applied at startup.
    #[serde(default)]
    pub locks: LockConfig,
    /// Lock file location, relative to the workspace root.
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
}

impl RuntimeConfig {
    /// Build a configuration with defaults for the given workspace root.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the workspace root cannot be canonicalized.
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Result<Self> {
        let mut config = Self {
            workspace_root: workspace_root.into(),
            action_timeout_seconds: default_action_timeout(),
            start_detect_seconds: default_start_detect(),
            reprocess_finished_messages: false,
            hidden_files: default_hidden_files(),
            locks: LockConfig::default(),
            lock_file: default_lock_file(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the workspace root, re-validating it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the new root cannot be canonicalized.
    pub fn override_workspace_root(&mut self, root: &Path) -> Result<()> {
        self.workspace_root = root.to_path_buf();
        self.validate()
    }

    /// Execution timeout for one action, or `None` when disabled.
    #[must_use]
    pub fn action_timeout(&self) -> Option<Duration> {
        (self.action_timeout_seconds > 0).then(|| Duration::from_secs(self.action_timeout_seconds))
    }

    /// Time a `start` action waits for the process to report its URL.
    #[must_use]
    pub fn start_detect_timeout(&self) -> Duration {
        Duration::from_secs(self.start_detect_seconds)
    }

    /// Absolute path of the lock file.
    #[must_use]
    pub fn lock_file_path(&self) -> PathBuf {
        self.workspace_root.join(&self.lock_file)
    }

    /// Compile the hidden-file patterns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if any pattern is not a valid regex.
    pub fn hidden_file_patterns(&self) -> Result<Vec<Regex>> {
        self.hidden_files
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| {
                    AppError::Config(format!("invalid hidden_files pattern {pattern:?}: {err}"))
                })
            })
            .collect()
    }

    fn validate(&mut self) -> Result<()> {
        if self.lock_file.is_absolute() {
            return Err(AppError::Config(
                "lock_file must be relative to workspace_root".into(),
            ));
        }

        self.hidden_file_patterns()?;

        let canonical_root = self
            .workspace_root
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace_root invalid: {err}")))?;
        self.workspace_root = canonical_root;

        Ok(())
    }
}
