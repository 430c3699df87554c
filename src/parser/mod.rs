//! Incremental parser for artifact and action tags in streamed responses.
//!
//! [`StreamingParser::parse`] receives the *cumulative* text of a message
//! on every call and returns only the narrative text revealed since the
//! previous call. Recognized tags and their bodies are stripped from that
//! text and reported through [`ParserCallbacks`] instead.
//!
//! Each message id owns one cursor: an explicit state (`Text`, `TagOpen`,
//! `InArtifact`, `InAction`), a stack of open element contexts, and the
//! byte offset consumed so far. A tag header that is split across chunks
//! is held back until its `>` arrives, so any chunking of the same
//! document yields the same text and the same lifecycle events.
//!
//! The parser never fails. Unrecognized or malformed markup degrades to
//! literal text (outside artifacts) or is dropped as artifact body
//! (inside artifacts).

pub mod callbacks;
pub(crate) mod tag;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::action::{ActionData, ActionKind};
use crate::models::artifact::{ArtifactData, ArtifactLifecycle};
use crate::AppError;

pub use callbacks::{ParserCallbacks, ParserEvent};
pub use tag::{ACTION_TAG_CLOSE, ACTION_TAG_OPEN, ARTIFACT_TAG_CLOSE, ARTIFACT_TAG_OPEN};

use tag::{
    header_len, match_closer, match_opener, parse_attributes, partial_marker_suffix, MarkerMatch,
};

/// Finite-state-machine state of a message cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseState {
    /// Scanning narrative text.
    #[default]
    Text,
    /// Holding an incomplete tag until more input arrives.
    TagOpen,
    /// Inside an artifact, between actions.
    InArtifact,
    /// Inside an action body.
    InAction,
}

/// Read-only view of a message cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSnapshot {
    /// Bytes of the cumulative text consumed so far.
    pub position: usize,
    /// Current FSM state.
    pub state: ParseState,
    /// Number of open element contexts (0, 1 or 2).
    pub depth: usize,
    /// Incomplete tag text held back at `position`.
    pub partial_tag: String,
    /// Lifecycle of the artifact being parsed, if any.
    pub artifact_lifecycle: Option<ArtifactLifecycle>,
}

#[derive(Debug)]
enum ElementContext {
    Artifact(ArtifactData),
    Action(OpenAction),
}

#[derive(Debug)]
struct OpenAction {
    /// `None` for actions of an unknown kind: the body is swallowed silently.
    data: Option<ActionData>,
    body_start: usize,
    streamed_len: usize,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Text,
    Artifact,
    Action,
}

enum Step {
    /// Keep scanning from this offset.
    Advance(usize),
    /// Everything up to this offset is consumed; wait for more input.
    Done(usize),
    /// An incomplete tag starts at this offset; hold it back.
    Wait(usize),
}

#[derive(Debug, Default)]
struct MessageCursor {
    position: usize,
    state: ParseState,
    stack: Vec<ElementContext>,
    partial_tag: String,
    next_action: usize,
}

impl MessageCursor {
    fn mode(&self) -> Mode {
        match self.stack.last() {
            None => Mode::Text,
            Some(ElementContext::Artifact(_)) => Mode::Artifact,
            Some(ElementContext::Action(_)) => Mode::Action,
        }
    }

    fn current_artifact(&mut self) -> Option<&mut ArtifactData> {
        self.stack.iter_mut().rev().find_map(|ctx| match ctx {
            ElementContext::Artifact(artifact) => Some(artifact),
            ElementContext::Action(_) => None,
        })
    }

    fn snapshot(&self) -> CursorSnapshot {
        let artifact_lifecycle = self
            .stack
            .iter()
            .find_map(|ctx| match ctx {
                ElementContext::Artifact(artifact) => Some(artifact.lifecycle),
                ElementContext::Action(_) => None,
            })
            .or_else(|| {
                (self.state == ParseState::TagOpen && self.stack.is_empty())
                    .then_some(ArtifactLifecycle::Opening)
            });

        CursorSnapshot {
            position: self.position,
            state: self.state,
            depth: self.stack.len(),
            partial_tag: self.partial_tag.clone(),
            artifact_lifecycle,
        }
    }
}

/// Streaming artifact parser, one cursor per message id.
#[derive(Debug)]
pub struct StreamingParser<C> {
    callbacks: C,
    cursors: HashMap<String, MessageCursor>,
}

impl<C: ParserCallbacks> StreamingParser<C> {
    /// Create a parser that reports events to `callbacks`.
    #[must_use]
    pub fn new(callbacks: C) -> Self {
        Self {
            callbacks,
            cursors: HashMap::new(),
        }
    }

    /// Event sink.
    #[must_use]
    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    /// Mutable event sink.
    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    /// Consume the parser, returning the event sink.
    #[must_use]
    pub fn into_callbacks(self) -> C {
        self.callbacks
    }

    /// Parse the cumulative `input` of `message_id`, returning new plain text.
    ///
    /// Calling again with unchanged input returns an empty string and fires
    /// no events. Input shorter than what was already consumed is ignored.
    pub fn parse(&mut self, message_id: &str, input: &str) -> String {
        let cursor = self.cursors.entry(message_id.to_owned()).or_default();

        if input.len() < cursor.position || !input.is_char_boundary(cursor.position) {
            debug!(
                message_id,
                consumed = cursor.position,
                received = input.len(),
                "input does not extend the consumed prefix, ignoring"
            );
            return String::new();
        }

        advance(cursor, message_id, input, &mut self.callbacks)
    }

    /// Release a held partial tag once the message stream has ended.
    ///
    /// Only text held at the top level is returned; partial markup inside
    /// an artifact is artifact body and stays stripped.
    pub fn finish(&mut self, message_id: &str) -> String {
        let Some(cursor) = self.cursors.get_mut(message_id) else {
            return String::new();
        };

        if cursor.state != ParseState::TagOpen || !cursor.stack.is_empty() {
            return String::new();
        }

        let released = std::mem::take(&mut cursor.partial_tag);
        cursor.position += released.len();
        cursor.state = ParseState::Text;
        debug!(
            message_id,
            released = released.len(),
            "released incomplete tag as text"
        );
        released
    }

    /// Drop every message cursor.
    pub fn reset(&mut self) {
        self.cursors.clear();
    }

    /// Inspect the cursor of `message_id`.
    #[must_use]
    pub fn cursor(&self, message_id: &str) -> Option<CursorSnapshot> {
        self.cursors.get(message_id).map(MessageCursor::snapshot)
    }
}

fn advance<C: ParserCallbacks>(
    cursor: &mut MessageCursor,
    message_id: &str,
    input: &str,
    callbacks: &mut C,
) -> String {
    let mut output = String::new();
    let mut offset = cursor.position;

    let waiting = loop {
        let step = match cursor.mode() {
            Mode::Text => scan_text(cursor, message_id, input, offset, &mut output, callbacks),
            Mode::Artifact => scan_artifact(cursor, message_id, input, offset, callbacks),
            Mode::Action => scan_action(cursor, input, offset, callbacks),
        };

        match step {
            Step::Advance(next) => offset = next,
            Step::Done(next) => {
                offset = next;
                break false;
            }
            Step::Wait(next) => {
                offset = next;
                break true;
            }
        }
    };

    cursor.position = offset;
    cursor.partial_tag = if waiting {
        input[offset..].to_owned()
    } else {
        String::new()
    };
    cursor.state = if waiting {
        ParseState::TagOpen
    } else {
        match cursor.mode() {
            Mode::Text => ParseState::Text,
            Mode::Artifact => ParseState::InArtifact,
            Mode::Action => ParseState::InAction,
        }
    };

    output
}

fn scan_text<C: ParserCallbacks>(
    cursor: &mut MessageCursor,
    message_id: &str,
    input: &str,
    offset: usize,
    output: &mut String,
    callbacks: &mut C,
) -> Step {
    let rest = &input[offset..];
    let Some(rel) = rest.find('<') else {
        output.push_str(rest);
        return Step::Done(input.len());
    };

    output.push_str(&rest[..rel]);
    let at = offset + rel;
    let tail = &input[at..];

    match match_opener(tail, ARTIFACT_TAG_OPEN) {
        MarkerMatch::None => {
            output.push('<');
            Step::Advance(at + 1)
        }
        MarkerMatch::Partial => Step::Wait(at),
        MarkerMatch::Full => {
            let Some(len) = header_len(tail) else {
                return Step::Wait(at);
            };
            let header = &tail[..len];

            match artifact_from_header(message_id, header) {
                Ok(artifact) => {
                    debug!(message_id, artifact_id = %artifact.id, "artifact opened");
                    callbacks.on_artifact_open(&artifact);
                    cursor.stack.push(ElementContext::Artifact(artifact));
                }
                Err(err) => {
                    warn!(message_id, error = %err, "passing artifact header through as text");
                    output.push_str(header);
                }
            }

            Step::Advance(at + len)
        }
    }
}

fn scan_artifact<C: ParserCallbacks>(
    cursor: &mut MessageCursor,
    message_id: &str,
    input: &str,
    offset: usize,
    callbacks: &mut C,
) -> Step {
    if let Some(artifact) = cursor.current_artifact() {
        artifact.lifecycle = ArtifactLifecycle::Open;
    }

    let Some(rel) = input[offset..].find('<') else {
        return Step::Done(input.len());
    };
    let at = offset + rel;
    let tail = &input[at..];

    let closer = match_closer(tail, ARTIFACT_TAG_CLOSE);
    if closer == MarkerMatch::Full {
        if let Some(ElementContext::Artifact(mut artifact)) = cursor.stack.pop() {
            artifact.lifecycle = ArtifactLifecycle::Closed;
            debug!(message_id, artifact_id = %artifact.id, "artifact closed");
            callbacks.on_artifact_close(&artifact);
        }
        return Step::Advance(at + ARTIFACT_TAG_CLOSE.len());
    }

    let opener = match_opener(tail, ACTION_TAG_OPEN);
    if opener == MarkerMatch::Full {
        let Some(len) = header_len(tail) else {
            return Step::Wait(at);
        };
        open_action(cursor, message_id, &tail[..len], at + len, callbacks);
        return Step::Advance(at + len);
    }

    if closer == MarkerMatch::Partial {
        if let Some(artifact) = cursor.current_artifact() {
            artifact.lifecycle = ArtifactLifecycle::Closing;
        }
        return Step::Wait(at);
    }

    if opener == MarkerMatch::Partial {
        return Step::Wait(at);
    }

    // Stray `<` inside the artifact body.
    Step::Advance(at + 1)
}

fn scan_action<C: ParserCallbacks>(
    cursor: &mut MessageCursor,
    input: &str,
    offset: usize,
    callbacks: &mut C,
) -> Step {
    let Some(ElementContext::Action(action)) = cursor.stack.last_mut() else {
        return Step::Done(offset);
    };
    let body_start = action.body_start;
    let rest = &input[offset..];

    if let Some(rel) = rest.find(ACTION_TAG_CLOSE) {
        let close_at = offset + rel;
        if let Some(ElementContext::Action(OpenAction {
            data: Some(mut data),
            ..
        })) = cursor.stack.pop()
        {
            data.content = input[body_start..close_at].to_owned();
            data.closed = true;
            callbacks.on_action_close(&data);
        }
        return Step::Advance(close_at + ACTION_TAG_CLOSE.len());
    }

    let held = partial_marker_suffix(rest, ACTION_TAG_CLOSE);
    let safe_end = input.len() - held;

    if let Some(data) = action.data.as_mut() {
        let body = &input[body_start..safe_end];
        if body.len() > action.streamed_len {
            action.streamed_len = body.len();
            data.content = body.to_owned();
            callbacks.on_action_stream(data);
        }
    }

    if held > 0 {
        Step::Wait(safe_end)
    } else {
        Step::Done(safe_end)
    }
}

fn open_action<C: ParserCallbacks>(
    cursor: &mut MessageCursor,
    message_id: &str,
    header: &str,
    body_start: usize,
    callbacks: &mut C,
) {
    let attributes = parse_attributes(header, ACTION_TAG_OPEN);

    let Some(kind_attr) = attributes.get("type") else {
        let err = AppError::MalformedTag("action header without a type attribute".into());
        debug!(message_id, error = %err, "dropping action header");
        return;
    };

    let kind = match ActionKind::from_attributes(
        kind_attr,
        attributes.get("filePath").map(String::as_str),
    ) {
        Ok(kind) => kind,
        Err(err @ AppError::UnknownActionKind(_)) => {
            warn!(message_id, error = %err, "ignoring action");
            cursor.stack.push(ElementContext::Action(OpenAction {
                data: None,
                body_start,
                streamed_len: 0,
            }));
            return;
        }
        Err(err) => {
            debug!(message_id, error = %err, "dropping action header");
            return;
        }
    };

    let action_id = format!("{message_id}-{}", cursor.next_action);
    let Some(artifact) = cursor.current_artifact() else {
        return;
    };
    let position = artifact.action_ids.len();
    artifact.action_ids.push(action_id.clone());

    let data = ActionData {
        message_id: message_id.to_owned(),
        artifact_id: artifact.id.clone(),
        action_id,
        position,
        kind,
        content: String::new(),
        closed: false,
    };
    cursor.next_action += 1;

    callbacks.on_action_open(&data);
    cursor.stack.push(ElementContext::Action(OpenAction {
        data: Some(data),
        body_start,
        streamed_len: 0,
    }));
}

fn artifact_from_header(message_id: &str, header: &str) -> crate::Result<ArtifactData> {
    let mut attributes = parse_attributes(header, ARTIFACT_TAG_OPEN);

    let id = attributes
        .remove("id")
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::MalformedTag("artifact header without an id".into()))?;
    let title = attributes
        .remove("title")
        .ok_or_else(|| AppError::MalformedTag(format!("artifact {id} has no title")))?;

    Ok(ArtifactData {
        message_id: message_id.to_owned(),
        id,
        title,
        artifact_type: attributes.remove("type"),
        lifecycle: ArtifactLifecycle::Open,
        action_ids: Vec::new(),
    })
}
