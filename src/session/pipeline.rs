//! Drives the streaming parser over chat messages and forwards its events
//! to the runner and the session.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::models::action::{ActionData, ActionRecord};
use crate::models::artifact::ArtifactData;
use crate::models::message::Message;
use crate::parser::callbacks::ParserCallbacks;
use crate::parser::StreamingParser;
use crate::runner::{ActionRunner, ExecutionHandle};

use super::SessionState;

/// Parser callbacks that feed the runner and the session.
///
/// File actions are registered as soon as their header is parsed so the
/// display can follow the write; other actions are registered when they
/// close. Every closed action is dispatched in arrival order.
pub struct RunnerBridge {
    runner: Arc<ActionRunner>,
    session: Arc<SessionState>,
    pending: Vec<ExecutionHandle>,
}

impl RunnerBridge {
    /// Create a bridge over a runner and its session.
    #[must_use]
    pub fn new(runner: Arc<ActionRunner>, session: Arc<SessionState>) -> Self {
        Self {
            runner,
            session,
            pending: Vec::new(),
        }
    }

    /// Handles of the actions dispatched since the last call.
    pub fn take_pending(&mut self) -> Vec<ExecutionHandle> {
        mem::take(&mut self.pending)
    }
}

impl ParserCallbacks for RunnerBridge {
    fn on_artifact_open(&mut self, artifact: &ArtifactData) {
        self.session.show_workbench();
        self.session.add_artifact(artifact);
    }

    fn on_artifact_close(&mut self, artifact: &ArtifactData) {
        self.session
            .close_artifact(&artifact.message_id, &artifact.id);
    }

    fn on_action_open(&mut self, action: &ActionData) {
        self.session
            .track_action(&action.message_id, &action.artifact_id, &action.action_id);
        if action.kind.file_path().is_some() {
            self.runner.enqueue(action);
        }
    }

    fn on_action_close(&mut self, action: &ActionData) {
        self.session
            .track_action(&action.message_id, &action.artifact_id, &action.action_id);
        self.pending.push(self.runner.dispatch(action));
    }

    fn on_action_stream(&mut self, action: &ActionData) {
        self.runner.update_preview(action);
    }
}

/// A change to the narrative text of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedText {
    /// Message the text belongs to.
    pub message_id: String,
    /// New text: appended, or the whole text when `replaced` is set.
    pub text: String,
    /// Whether `text` replaces everything parsed before.
    pub replaced: bool,
}

/// Parses a chat transcript into narrative text and runner work.
pub struct MessagePipeline {
    parser: StreamingParser<RunnerBridge>,
    parsed: HashMap<String, String>,
    reprocess_finished: bool,
}

impl MessagePipeline {
    /// Create a pipeline feeding `runner` and `session`.
    #[must_use]
    pub fn new(
        config: &RuntimeConfig,
        runner: Arc<ActionRunner>,
        session: Arc<SessionState>,
    ) -> Self {
        Self {
            parser: StreamingParser::new(RunnerBridge::new(runner, session)),
            parsed: HashMap::new(),
            reprocess_finished: config.reprocess_finished_messages,
        }
    }

    /// Parse the current content of every message.
    ///
    /// `is_loading` tells whether the last message is still streaming.
    /// When it is not and reprocessing is enabled, the parser is reset
    /// and each message's text is rebuilt from scratch; actions that
    /// already settled are not run again. System messages are skipped.
    pub fn parse_messages(&mut self, messages: &[Message], is_loading: bool) -> Vec<ParsedText> {
        let reset = self.reprocess_finished && !is_loading;
        if reset {
            debug!("re-parsing finished messages from scratch");
            self.parser.reset();
        }

        let mut updates = Vec::new();
        for message in messages.iter().filter(|m| m.is_parsed()) {
            let delta = self.parser.parse(&message.id, &message.content);
            if reset {
                self.parsed.insert(message.id.clone(), delta.clone());
            } else if delta.is_empty() {
                continue;
            } else {
                self.parsed
                    .entry(message.id.clone())
                    .or_default()
                    .push_str(&delta);
            }
            updates.push(ParsedText {
                message_id: message.id.clone(),
                text: delta,
                replaced: reset,
            });
        }
        updates
    }

    /// Flush a message whose stream has ended; returns released text.
    pub fn finish(&mut self, message_id: &str) -> String {
        let released = self.parser.finish(message_id);
        if !released.is_empty() {
            self.parsed
                .entry(message_id.to_owned())
                .or_default()
                .push_str(&released);
        }
        released
    }

    /// Narrative text parsed so far for a message.
    #[must_use]
    pub fn parsed(&self, message_id: &str) -> Option<&str> {
        self.parsed.get(message_id).map(String::as_str)
    }

    /// Forget all parser state and parsed text.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.parsed.clear();
    }

    /// Wait for every action dispatched so far to settle.
    pub async fn settle(&mut self) -> Vec<ActionRecord> {
        let handles = self.parser.callbacks_mut().take_pending();
        let mut records = Vec::with_capacity(handles.len());
        for handle in handles {
            let action_id = handle.action_id().to_owned();
            match handle.wait().await {
                Ok(record) => records.push(record),
                Err(err) => warn!(action_id, %err, "dispatched action vanished"),
            }
        }
        info!(settled = records.len(), "dispatched actions settled");
        records
    }
}
