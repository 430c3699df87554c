//! Action model: one executable instruction inside an artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppError;

/// What an action does when it runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Write the action body to `file_path`.
    File {
        /// Target path, normalized to a `/`-rooted workspace path.
        file_path: String,
    },
    /// Run the action body as a shell command and wait for it.
    Shell,
    /// Start the action body as a long-running process exposing a preview.
    Start,
}

impl ActionKind {
    /// Interpret the `type` and `filePath` attributes of an action tag.
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownActionKind` for a `type` outside
    /// `file`/`shell`/`start`, and `AppError::MalformedTag` when a `file`
    /// action has no usable `filePath`.
    pub fn from_attributes(kind: &str, file_path: Option<&str>) -> crate::Result<Self> {
        match kind {
            "file" => match file_path.map(str::trim) {
                Some(path) if !path.is_empty() => Ok(Self::File {
                    file_path: super::normalize_path(path),
                }),
                _ => Err(AppError::MalformedTag(
                    "file action requires a filePath attribute".into(),
                )),
            },
            "shell" => Ok(Self::Shell),
            "start" => Ok(Self::Start),
            other => Err(AppError::UnknownActionKind(other.to_owned())),
        }
    }

    /// Short lowercase name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Shell => "shell",
            Self::Start => "start",
        }
    }

    /// Target path for file actions.
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::File { file_path } => Some(file_path),
            Self::Shell | Self::Start => None,
        }
    }
}

/// Lifecycle status of an action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Body still arriving; content is a live preview only.
    Streaming,
    /// Body complete and waiting for the execution slot.
    Pending,
    /// Currently executing against the workspace.
    Running,
    /// Finished successfully.
    Complete,
    /// Finished with an error; see the record's failure payload.
    Failed,
    /// Not executed because an earlier action in the same artifact failed.
    Skipped,
    /// Not executed because the run was cancelled.
    Aborted,
}

impl ActionStatus {
    /// Whether the status can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Failed | Self::Skipped | Self::Aborted
        )
    }

    /// Lowercase name used in logs and summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Aborted => "aborted",
        }
    }
}

/// Action payload carried by parser events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionData {
    /// Message the action was parsed from.
    pub message_id: String,
    /// Enclosing artifact id.
    pub artifact_id: String,
    /// Action id, unique within the session (`{message_id}-{n}`).
    pub action_id: String,
    /// Zero-based arrival index inside the artifact.
    pub position: usize,
    /// What the action does.
    pub kind: ActionKind,
    /// Body observed so far; complete once `closed` is true.
    pub content: String,
    /// Whether the closing tag has been parsed.
    pub closed: bool,
}

/// Runner-side state of one action.
///
/// `preview_content` follows the stream; `committed_content` is only set
/// when the closing tag arrives and is the only body the runner executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    /// Action id (`{message_id}-{n}`).
    pub id: String,
    /// Message the action was parsed from.
    pub message_id: String,
    /// Enclosing artifact id.
    pub artifact_id: String,
    /// Execution order inside the artifact.
    pub position: usize,
    /// What the action does.
    pub kind: ActionKind,
    /// Current lifecycle status.
    pub status: ActionStatus,
    /// Latest streamed body, for display.
    pub preview_content: String,
    /// Final body, present once the closing tag was parsed.
    pub committed_content: Option<String>,
    /// Interleaved stdout/stderr captured while running.
    pub output: String,
    /// Why the action failed, was skipped, or was aborted.
    pub failure: Option<AppError>,
    /// When the action entered `running`.
    pub started_at: Option<DateTime<Utc>>,
    /// When the action reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    /// Build a record from the first event that mentions the action.
    #[must_use]
    pub fn from_data(data: &ActionData) -> Self {
        let (status, committed_content) = if data.closed {
            (ActionStatus::Pending, Some(data.content.clone()))
        } else {
            (ActionStatus::Streaming, None)
        };

        Self {
            id: data.action_id.clone(),
            message_id: data.message_id.clone(),
            artifact_id: data.artifact_id.clone(),
            position: data.position,
            kind: data.kind.clone(),
            status,
            preview_content: data.content.clone(),
            committed_content,
            output: String::new(),
            failure: None,
            started_at: None,
            finished_at: None,
        }
    }
}
