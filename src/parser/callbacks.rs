//! Event sink for the streaming parser.

use crate::models::action::ActionData;
use crate::models::artifact::ArtifactData;

/// Receives lifecycle events synchronously while `parse` runs.
///
/// Handlers must return quickly; anything slow belongs behind a queue
/// (see [`crate::runner::ActionRunner::dispatch`]).
pub trait ParserCallbacks {
    /// An artifact header was parsed.
    fn on_artifact_open(&mut self, _artifact: &ArtifactData) {}

    /// An artifact closing tag was parsed.
    fn on_artifact_close(&mut self, _artifact: &ArtifactData) {}

    /// An action header was parsed.
    fn on_action_open(&mut self, _action: &ActionData) {}

    /// An action closing tag was parsed; `action.content` is final.
    fn on_action_close(&mut self, _action: &ActionData) {}

    /// An open action's body grew; `action.content` is a live preview.
    fn on_action_stream(&mut self, _action: &ActionData) {}
}

impl ParserCallbacks for () {}

/// A parser event captured by the recording sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    /// See [`ParserCallbacks::on_artifact_open`].
    ArtifactOpen(ArtifactData),
    /// See [`ParserCallbacks::on_artifact_close`].
    ArtifactClose(ArtifactData),
    /// See [`ParserCallbacks::on_action_open`].
    ActionOpen(ActionData),
    /// See [`ParserCallbacks::on_action_close`].
    ActionClose(ActionData),
    /// See [`ParserCallbacks::on_action_stream`].
    ActionStream(ActionData),
}

impl ParserEvent {
    /// Whether this is an artifact/action open or close event.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, Self::ActionStream(_))
    }
}

/// Recording sink; useful for tests and offline inspection.
impl ParserCallbacks for Vec<ParserEvent> {
    fn on_artifact_open(&mut self, artifact: &ArtifactData) {
        self.push(ParserEvent::ArtifactOpen(artifact.clone()));
    }

    fn on_artifact_close(&mut self, artifact: &ArtifactData) {
        self.push(ParserEvent::ArtifactClose(artifact.clone()));
    }

    fn on_action_open(&mut self, action: &ActionData) {
        self.push(ParserEvent::ActionOpen(action.clone()));
    }

    fn on_action_close(&mut self, action: &ActionData) {
        self.push(ParserEvent::ActionClose(action.clone()));
    }

    fn on_action_stream(&mut self, action: &ActionData) {
        self.push(ParserEvent::ActionStream(action.clone()));
    }
}
