//! Preview endpoint exposed by a started process.

use serde::{Deserialize, Serialize};

/// A running server the display layer can embed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PreviewInfo {
    /// Port the process listens on.
    pub port: u16,
    /// URL announced by the process.
    pub base_url: String,
}
