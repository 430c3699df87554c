//! Action records and their status transitions.
//!
//! The store is plain synchronous state guarded by a `std::sync::Mutex`
//! in [`super::ActionRunner`]; nothing here awaits.

use std::collections::HashMap;

use chrono::Utc;

use crate::models::action::{ActionData, ActionKind, ActionRecord, ActionStatus};
use crate::AppError;

/// Key of an artifact queue: `(message_id, artifact_id)`.
type ArtifactKey = (String, String);

#[derive(Debug, Default)]
struct ArtifactQueue {
    /// Action ids in position order.
    action_ids: Vec<String>,
    /// Failure that broke the artifact, if any.
    failure: Option<AppError>,
}

/// What the worker needs to run an action that entered `running`.
#[derive(Debug, Clone)]
pub(crate) struct Started {
    pub(crate) kind: ActionKind,
    pub(crate) content: String,
}

#[derive(Debug, Default)]
pub(crate) struct ActionStore {
    records: HashMap<String, ActionRecord>,
    registration_order: Vec<String>,
    queues: HashMap<ArtifactKey, ArtifactQueue>,
    completion_order: Vec<String>,
    aborted: bool,
}

fn key_of(record: &ActionRecord) -> ArtifactKey {
    (record.message_id.clone(), record.artifact_id.clone())
}

fn aborted_error() -> AppError {
    AppError::Aborted("run aborted before the action started".into())
}

impl ActionStore {
    /// Register or refresh an action and return its status afterwards.
    pub(crate) fn register(&mut self, data: &ActionData) -> ActionStatus {
        if let Some(record) = self.records.get_mut(&data.action_id) {
            if record.status.is_terminal() {
                return record.status;
            }
            if record.status == ActionStatus::Streaming {
                record.preview_content.clone_from(&data.content);
                if data.closed {
                    record.committed_content = Some(data.content.clone());
                    record.status = ActionStatus::Pending;
                }
            }
            return record.status;
        }

        let mut record = ActionRecord::from_data(data);
        let key = key_of(&record);
        let queue = self.queues.entry(key).or_default();

        if self.aborted {
            record.status = ActionStatus::Aborted;
            record.failure = Some(aborted_error());
            record.finished_at = Some(Utc::now());
        } else if let Some(cause) = &queue.failure {
            record.status = ActionStatus::Skipped;
            record.failure = Some(cause.clone());
            record.finished_at = Some(Utc::now());
        }

        let insert_at = queue
            .action_ids
            .iter()
            .position(|id| {
                self.records
                    .get(id)
                    .is_some_and(|other| other.position > record.position)
            })
            .unwrap_or(queue.action_ids.len());
        queue.action_ids.insert(insert_at, record.id.clone());

        let status = record.status;
        self.registration_order.push(record.id.clone());
        self.records.insert(record.id.clone(), record);
        status
    }

    /// Refresh the live preview of a streaming action.
    pub(crate) fn update_preview(&mut self, data: &ActionData) -> ActionStatus {
        match self.records.get_mut(&data.action_id) {
            Some(record) if record.status == ActionStatus::Streaming => {
                record.preview_content.clone_from(&data.content);
                record.status
            }
            Some(record) => record.status,
            None => self.register(data),
        }
    }

    /// Whether an earlier action of the same artifact has not settled yet.
    pub(crate) fn is_blocked(&self, action_id: &str) -> bool {
        let Some(record) = self.records.get(action_id) else {
            return false;
        };
        if record.status.is_terminal() {
            return false;
        }
        self.queues.get(&key_of(record)).is_some_and(|queue| {
            queue
                .action_ids
                .iter()
                .take_while(|id| id.as_str() != action_id)
                .filter_map(|id| self.records.get(id))
                .any(|earlier| !earlier.status.is_terminal())
        })
    }

    /// Move a pending action to `running`.
    ///
    /// Returns `None` when the action must not run: it is unknown, not
    /// closed yet, already settled, or settled here because the run was
    /// aborted or its artifact is broken.
    pub(crate) fn begin(&mut self, action_id: &str) -> Option<Started> {
        let aborted = self.aborted;
        let record = self.records.get_mut(action_id)?;
        if record.status != ActionStatus::Pending {
            return None;
        }

        if aborted {
            record.status = ActionStatus::Aborted;
            record.failure = Some(aborted_error());
            record.finished_at = Some(Utc::now());
            return None;
        }

        let broken = self
            .queues
            .get(&key_of(record))
            .and_then(|queue| queue.failure.clone());
        if let Some(cause) = broken {
            record.status = ActionStatus::Skipped;
            record.failure = Some(cause);
            record.finished_at = Some(Utc::now());
            return None;
        }

        record.status = ActionStatus::Running;
        record.started_at = Some(Utc::now());
        Some(Started {
            kind: record.kind.clone(),
            content: record.committed_content.clone().unwrap_or_default(),
        })
    }

    /// Record the outcome of a running action. A failure marks every later
    /// unsettled action of the same artifact `skipped`.
    pub(crate) fn finish(&mut self, action_id: &str, outcome: Result<(), AppError>) {
        let Some(record) = self.records.get_mut(action_id) else {
            return;
        };
        if record.status != ActionStatus::Running {
            return;
        }

        record.finished_at = Some(Utc::now());
        self.completion_order.push(action_id.to_owned());

        let cause = match outcome {
            Ok(()) => {
                record.status = ActionStatus::Complete;
                return;
            }
            Err(err) => {
                record.status = ActionStatus::Failed;
                record.failure = Some(err.clone());
                err
            }
        };

        let key = key_of(record);
        let Some(queue) = self.queues.get_mut(&key) else {
            return;
        };
        queue.failure = Some(cause.clone());

        let later = queue
            .action_ids
            .iter()
            .skip_while(|id| id.as_str() != action_id)
            .skip(1);
        for id in later {
            if let Some(other) = self.records.get_mut(id) {
                if !other.status.is_terminal() {
                    other.status = ActionStatus::Skipped;
                    other.failure = Some(cause.clone());
                    other.finished_at = Some(Utc::now());
                }
            }
        }
    }

    /// Append live process output to an action.
    pub(crate) fn append_output(&mut self, action_id: &str, text: &str) {
        if let Some(record) = self.records.get_mut(action_id) {
            record.output.push_str(text);
        }
    }

    /// Mark every action that has not started yet `aborted` and refuse new
    /// work. Returns the number of actions affected.
    pub(crate) fn abort_all(&mut self) -> usize {
        self.aborted = true;
        let mut affected = 0;
        for record in self.records.values_mut() {
            if matches!(
                record.status,
                ActionStatus::Pending | ActionStatus::Streaming
            ) {
                record.status = ActionStatus::Aborted;
                record.failure = Some(aborted_error());
                record.finished_at = Some(Utc::now());
                affected += 1;
            }
        }
        affected
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub(crate) fn record(&self, action_id: &str) -> Option<ActionRecord> {
        self.records.get(action_id).cloned()
    }

    pub(crate) fn records(&self) -> Vec<ActionRecord> {
        self.registration_order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    pub(crate) fn completion_order(&self) -> Vec<String> {
        self.completion_order.clone()
    }
}
