//! Artifact model: a top-level block that groups ordered actions.

use serde::{Deserialize, Serialize};

/// Where an artifact is in its tag lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactLifecycle {
    /// Opening tag seen but its header is not complete yet.
    Opening,
    /// Header parsed; actions may follow.
    Open,
    /// A prefix of the closing tag is buffered.
    Closing,
    /// Closing tag parsed.
    Closed,
}

/// Artifact payload carried by parser events and kept by the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ArtifactData {
    /// Message the artifact was parsed from.
    pub message_id: String,
    /// Value of the `id` attribute.
    pub id: String,
    /// Value of the `title` attribute.
    pub title: String,
    /// Optional `type` attribute (for example `bundled`).
    pub artifact_type: Option<String>,
    /// Lifecycle at the time the payload was produced.
    pub lifecycle: ArtifactLifecycle,
    /// Ids of the actions recognized so far, in position order.
    pub action_ids: Vec<String>,
}

impl ArtifactData {
    /// Whether the closing tag has been parsed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle == ArtifactLifecycle::Closed
    }
}
