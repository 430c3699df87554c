//! Background task that executes actions one at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::locks::LockCoordinator;
use crate::models::action::{ActionKind, ActionRecord};
use crate::session::SessionState;
use crate::workspace::{parent_dir, OutputChunk, Workspace};
use crate::{AppError, Result};

use super::store::{ActionStore, Started};

/// A queued request to run one action.
pub(crate) struct Job {
    pub(crate) action_id: String,
    pub(crate) done: oneshot::Sender<ActionRecord>,
}

pub(crate) struct Worker {
    pub(crate) store: Arc<Mutex<ActionStore>>,
    pub(crate) workspace: Arc<dyn Workspace>,
    pub(crate) locks: Arc<LockCoordinator>,
    pub(crate) session: Arc<SessionState>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancel: CancellationToken,
}

impl Worker {
    fn store(&self) -> MutexGuard<'_, ActionStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain the job queue until every sender is gone.
    ///
    /// A job whose artifact still has an earlier unsettled action is held
    /// back and retried after each completed job. Cancellation settles
    /// every held-back job at once.
    pub(crate) async fn run(self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        let mut waiting: Vec<Job> = Vec::new();
        let mut cancel_seen = false;

        loop {
            let job = tokio::select! {
                job = jobs.recv() => job,
                () = self.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    self.settle_aborted(&mut waiting);
                    continue;
                }
            };
            let Some(job) = job else {
                break;
            };
            waiting.push(job);
            self.drain(&mut waiting).await;
        }

        if !waiting.is_empty() {
            warn!(
                count = waiting.len(),
                "job queue closed with actions still waiting on earlier actions"
            );
        }
        for job in waiting {
            self.settle(job);
        }
        debug!("action worker stopped");
    }

    async fn drain(&self, waiting: &mut Vec<Job>) {
        loop {
            let next = {
                let store = self.store();
                waiting
                    .iter()
                    .position(|job| !store.is_blocked(&job.action_id))
            };
            let Some(index) = next else {
                break;
            };
            let job = waiting.remove(index);
            self.run_job(job).await;
        }
    }

    fn settle_aborted(&self, waiting: &mut Vec<Job>) {
        let affected = self.store().abort_all();
        debug!(
            affected,
            held = waiting.len(),
            "run cancelled; settling held-back jobs"
        );
        for job in waiting.drain(..) {
            self.settle(job);
        }
    }

    fn settle(&self, job: Job) {
        if let Some(record) = self.store().record(&job.action_id) {
            // The caller may have dropped its handle.
            let _ = job.done.send(record);
        }
    }

    async fn run_job(&self, job: Job) {
        if self.cancel.is_cancelled() {
            self.store().abort_all();
            self.settle(job);
            return;
        }

        let started = self.store().begin(&job.action_id);
        let Some(started) = started else {
            debug!(action_id = job.action_id, "action not runnable; settling as is");
            self.settle(job);
            return;
        };

        let span = info_span!(
            "action",
            action_id = %job.action_id,
            kind = started.kind.name(),
        );
        let outcome = self
            .perform(&job.action_id, &started)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &outcome {
            Ok(()) => info!("action complete"),
            Err(err) => warn!(%err, "action failed"),
        });

        self.store().finish(&job.action_id, outcome);
        self.settle(job);
    }

    async fn perform(&self, action_id: &str, started: &Started) -> Result<()> {
        let work = async {
            match &started.kind {
                ActionKind::File { file_path } => {
                    self.write_file(file_path, &started.content).await
                }
                ActionKind::Shell => self.run_shell(action_id, &started.content).await,
                ActionKind::Start => self.start_process(action_id, &started.content).await,
            }
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                AppError::Timeout(format!("action {action_id} exceeded {limit:?}"))
            })?,
            None => work.await,
        }
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let status = self.locks.is_locked(path);
        if status.locked {
            let detail = match status.locked_by_folder {
                Some(folder) => format!("{path} (inside locked folder {folder})"),
                None => path.to_owned(),
            };
            return Err(AppError::LockedPath(detail));
        }

        if let Some(parent) = parent_dir(path) {
            self.workspace.create_dir_all(parent).await?;
        }
        self.workspace.write_file(path, content).await?;
        self.session.record_file(path, content);

        debug!(path, bytes = content.len(), "file action written");
        Ok(())
    }

    async fn run_shell(&self, action_id: &str, command: &str) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (result, ()) = tokio::join!(
            self.workspace.exec(command, tx),
            forward_output(Arc::clone(&self.store), action_id.to_owned(), rx),
        );
        let output = result?;

        if output.success() {
            Ok(())
        } else {
            Err(AppError::ShellExecution {
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }

    async fn start_process(&self, action_id: &str, command: &str) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        // The process outlives the action; keep collecting its output.
        tokio::spawn(forward_output(
            Arc::clone(&self.store),
            action_id.to_owned(),
            rx,
        ));

        let preview = self.workspace.start_process(command, tx).await?;
        info!(port = preview.port, base_url = %preview.base_url, "preview registered");
        self.session.add_preview(preview);
        Ok(())
    }
}

/// Copy process output into the action record until the producer is done.
async fn forward_output(
    store: Arc<Mutex<ActionStore>>,
    action_id: String,
    mut output: mpsc::UnboundedReceiver<OutputChunk>,
) {
    while let Some(chunk) = output.recv().await {
        store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append_output(&action_id, &chunk.text);
    }
}
