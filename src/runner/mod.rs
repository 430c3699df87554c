//! Action runner: serializes and executes parsed actions.
//!
//! Parser callbacks call [`ActionRunner::enqueue`] and
//! [`ActionRunner::dispatch`] synchronously; a single background worker
//! executes jobs in dispatch order against the [`Workspace`]. An action
//! whose artifact still has an earlier unsettled action waits until that
//! action settles, so actions of one artifact always run in position order.
//!
//! Status flow: `streaming → pending → running → complete | failed`, with
//! `skipped` (an earlier action of the artifact failed) and `aborted`
//! (cancelled before it started) as the other terminal states. A terminal
//! action is never executed again.

mod store;
mod worker;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::RuntimeConfig;
use crate::locks::LockCoordinator;
use crate::models::action::{ActionData, ActionRecord, ActionStatus};
use crate::session::SessionState;
use crate::workspace::Workspace;
use crate::{AppError, Result};

use self::store::ActionStore;
use self::worker::{Job, Worker};

/// Resolves once a dispatched action has settled.
pub struct ExecutionHandle {
    action_id: String,
    done: Option<oneshot::Receiver<ActionRecord>>,
    store: Arc<Mutex<ActionStore>>,
}

impl ExecutionHandle {
    /// Id of the dispatched action.
    #[must_use]
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Wait for the action to settle and return its record.
    ///
    /// If the runner was shut down before the job ran, the record is
    /// returned as it stands.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the action is unknown to the runner.
    pub async fn wait(self) -> Result<ActionRecord> {
        if let Some(done) = self.done {
            if let Ok(record) = done.await {
                return Ok(record);
            }
        }
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&self.action_id)
            .ok_or_else(|| AppError::NotFound(format!("action {}", self.action_id)))
    }
}

/// Executes actions against a workspace, one at a time.
pub struct ActionRunner {
    store: Arc<Mutex<ActionStore>>,
    jobs: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl ActionRunner {
    /// Start the runner and its worker task.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(
        config: &RuntimeConfig,
        workspace: Arc<dyn Workspace>,
        locks: Arc<LockCoordinator>,
        session: Arc<SessionState>,
    ) -> Self {
        let store = Arc::new(Mutex::new(ActionStore::default()));
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Worker {
            store: Arc::clone(&store),
            workspace,
            locks,
            session,
            timeout: config.action_timeout(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(worker.run(rx).instrument(info_span!("action_worker")));

        Self {
            store,
            jobs: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(handle)),
            cancel,
        }
    }

    fn store(&self) -> MutexGuard<'_, ActionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a newly observed action, or refresh a known one.
    ///
    /// An open action becomes `streaming`; a closed one `pending` with its
    /// body committed. Terminal actions are left untouched. Returns the
    /// status after registration.
    pub fn enqueue(&self, action: &ActionData) -> ActionStatus {
        let status = self.store().register(action);
        debug!(
            action_id = action.action_id,
            status = status.as_str(),
            "action enqueued"
        );
        status
    }

    /// Refresh the live preview of a streaming action without touching the
    /// workspace. Unknown actions are registered first.
    pub fn update_preview(&self, action: &ActionData) -> ActionStatus {
        self.store().update_preview(action)
    }

    /// Queue a closed action for execution and return immediately.
    ///
    /// The action is registered first if needed. Jobs run in dispatch
    /// order; the handle resolves once the action settles.
    pub fn dispatch(&self, action: &ActionData) -> ExecutionHandle {
        self.enqueue(action);

        let (done_tx, done_rx) = oneshot::channel();
        let job = Job {
            action_id: action.action_id.clone(),
            done: done_tx,
        };

        let sent = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|jobs| jobs.send(job).is_ok());
        if !sent {
            debug!(action_id = action.action_id, "runner shut down; action not queued");
        }

        ExecutionHandle {
            action_id: action.action_id.clone(),
            done: sent.then_some(done_rx),
            store: Arc::clone(&self.store),
        }
    }

    /// Execute an action.
    ///
    /// With `is_streaming` set only the live preview is refreshed and the
    /// current record is returned; the workspace is not touched. Otherwise
    /// the action is dispatched and awaited.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the action cannot be found afterwards.
    pub async fn execute(&self, action: &ActionData, is_streaming: bool) -> Result<ActionRecord> {
        if is_streaming {
            self.update_preview(action);
            return self
                .action(&action.action_id)
                .ok_or_else(|| AppError::NotFound(format!("action {}", action.action_id)));
        }
        self.dispatch(action).wait().await
    }

    /// Cancel the run: every action that has not started becomes `aborted`
    /// and no further job starts. A running action finishes normally.
    pub fn abort(&self) {
        self.cancel.cancel();
        let affected = self.store().abort_all();
        info!(affected, "action run aborted");
    }

    /// Whether [`abort`](Self::abort) was called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.store().is_aborted()
    }

    /// Snapshot of one action.
    #[must_use]
    pub fn action(&self, action_id: &str) -> Option<ActionRecord> {
        self.store().record(action_id)
    }

    /// Snapshot of every action in registration order.
    #[must_use]
    pub fn actions(&self) -> Vec<ActionRecord> {
        self.store().records()
    }

    /// Ids of the actions that ran, in the order they finished.
    #[must_use]
    pub fn completion_order(&self) -> Vec<String> {
        self.store().completion_order()
    }

    /// Stop accepting jobs and wait for the queued ones to settle.
    pub async fn shutdown(&self) {
        drop(
            self.jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(%err, "action worker panicked");
            }
        }
    }
}

impl Drop for ActionRunner {
    fn drop(&mut self) {
        // Stops the worker from starting queued jobs once the runner is gone.
        self.cancel.cancel();
    }
}
