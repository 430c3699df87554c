//! Session state shared between the runner and a display layer.
//!
//! Holds the files written by actions, the artifacts seen in the chat and
//! the previews exposed by started processes. Every map sits behind a
//! `std::sync::RwLock` and values are replaced whole, so a reader never
//! observes a partially written file.

pub mod file_tree;
pub mod pipeline;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use regex::Regex;
use tracing::debug;

use crate::models::artifact::{ArtifactData, ArtifactLifecycle};
use crate::models::normalize_path;
use crate::models::preview::PreviewInfo;

use self::file_tree::{file_list, FileNode};

/// One entry of the session file map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEntry {
    /// A file and its last committed content.
    File {
        /// File body.
        content: String,
    },
    /// A folder implied by a file path.
    Folder,
}

impl FileEntry {
    /// Whether this entry is a folder.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }
}

/// Files, artifacts and previews for one chat session.
#[derive(Debug, Default)]
pub struct SessionState {
    files: RwLock<BTreeMap<String, FileEntry>>,
    artifacts: RwLock<Vec<ArtifactData>>,
    previews: RwLock<Vec<PreviewInfo>>,
    show_workbench: AtomicBool,
}

impl SessionState {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ─── workbench ──────────────────────────────────────────

    /// Ask the display layer to show the workbench.
    pub fn show_workbench(&self) {
        self.show_workbench.store(true, Ordering::SeqCst);
    }

    /// Hide the workbench.
    pub fn hide_workbench(&self) {
        self.show_workbench.store(false, Ordering::SeqCst);
    }

    /// Whether the workbench was requested.
    #[must_use]
    pub fn is_workbench_visible(&self) -> bool {
        self.show_workbench.load(Ordering::SeqCst)
    }

    // ─── artifacts ──────────────────────────────────────────

    /// Register an artifact; a second registration of the same
    /// `(message_id, id)` pair is ignored.
    pub fn add_artifact(&self, artifact: &ArtifactData) {
        let mut artifacts = self
            .artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if artifacts
            .iter()
            .any(|a| a.message_id == artifact.message_id && a.id == artifact.id)
        {
            return;
        }
        artifacts.push(artifact.clone());
    }

    /// Mark an artifact closed. Returns `false` if it is unknown.
    pub fn close_artifact(&self, message_id: &str, artifact_id: &str) -> bool {
        self.update_artifact(message_id, artifact_id, |artifact| {
            artifact.lifecycle = ArtifactLifecycle::Closed;
        })
    }

    /// Append an action id to an artifact's ordered list, once.
    pub fn track_action(&self, message_id: &str, artifact_id: &str, action_id: &str) -> bool {
        self.update_artifact(message_id, artifact_id, |artifact| {
            if !artifact.action_ids.iter().any(|id| id == action_id) {
                artifact.action_ids.push(action_id.to_owned());
            }
        })
    }

    /// Look up one artifact.
    #[must_use]
    pub fn artifact(&self, message_id: &str, artifact_id: &str) -> Option<ArtifactData> {
        self.artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|a| a.message_id == message_id && a.id == artifact_id)
            .cloned()
    }

    /// All artifacts in the order they were opened.
    #[must_use]
    pub fn artifacts(&self) -> Vec<ArtifactData> {
        self.artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_artifact(
        &self,
        message_id: &str,
        artifact_id: &str,
        apply: impl FnOnce(&mut ArtifactData),
    ) -> bool {
        let mut artifacts = self
            .artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match artifacts
            .iter_mut()
            .find(|a| a.message_id == message_id && a.id == artifact_id)
        {
            Some(artifact) => {
                apply(artifact);
                true
            }
            None => false,
        }
    }

    // ─── files ──────────────────────────────────────────────

    /// Record a committed file write, creating folder entries for every
    /// ancestor.
    pub fn record_file(&self, path: &str, content: &str) {
        let path = normalize_path(path);
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);

        let mut folder = String::new();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        if let Some((_, parents)) = segments.split_last() {
            for segment in parents {
                folder.push('/');
                folder.push_str(segment);
                files.entry(folder.clone()).or_insert(FileEntry::Folder);
            }
        }

        debug!(path, bytes = content.len(), "session file updated");
        files.insert(
            path,
            FileEntry::File {
                content: content.to_owned(),
            },
        );
    }

    /// Look up one file or folder.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<FileEntry> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_path(path))
            .cloned()
    }

    /// Snapshot of the whole file map.
    #[must_use]
    pub fn files(&self) -> BTreeMap<String, FileEntry> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Flattened tree of the session files under `root_folder`, skipping
    /// paths matched by `hidden`.
    #[must_use]
    pub fn file_list(&self, root_folder: &str, hide_root: bool, hidden: &[Regex]) -> Vec<FileNode> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        file_list(&files, root_folder, hide_root, hidden)
    }

    // ─── previews ───────────────────────────────────────────

    /// Register a preview; an existing preview on the same port is replaced.
    pub fn add_preview(&self, preview: PreviewInfo) {
        let mut previews = self
            .previews
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        previews.retain(|p| p.port != preview.port);
        previews.push(preview);
    }

    /// Remove the preview on `port`.
    pub fn remove_preview(&self, port: u16) -> bool {
        let mut previews = self
            .previews
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = previews.len();
        previews.retain(|p| p.port != port);
        previews.len() != before
    }

    /// All previews in registration order.
    #[must_use]
    pub fn previews(&self) -> Vec<PreviewInfo> {
        self.previews
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The preview to show by default: the one on the lowest port.
    #[must_use]
    pub fn active_preview(&self) -> Option<PreviewInfo> {
        self.previews
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .min_by_key(|p| p.port)
            .cloned()
    }
}
