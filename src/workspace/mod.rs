//! Workspace collaborator interface.
//!
//! The [`Workspace`] trait is the only way the runner touches files and
//! processes. [`local::LocalWorkspace`] implements it over a directory on
//! disk; tests and embedders can supply their own sandbox.
//!
//! Paths are workspace paths as written in action tags (`/src/index.js`),
//! always interpreted relative to the workspace root.

pub mod local;
pub mod path_safety;
pub mod writer;

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::models::preview::PreviewInfo;
use crate::Result;

/// Boxed future returned by [`Workspace`] methods.
pub type WorkspaceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// A piece of live process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Source stream.
    pub stream: OutputStream,
    /// Text, including its trailing newline when the process wrote one.
    pub text: String,
}

/// Channel the workspace streams process output into.
pub type OutputSink = mpsc::UnboundedSender<OutputChunk>;

/// Result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    /// Everything written to standard output.
    pub stdout: String,
    /// Everything written to standard error.
    pub stderr: String,
    /// Exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

impl ExecOutput {
    /// Whether the command exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// File and process operations the runner performs.
///
/// Dropping a returned future before it completes must be safe; a
/// workspace that can terminate processes should do so on drop.
pub trait Workspace: Send + Sync {
    /// Create `path` and any missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all<'a>(&'a self, path: &'a str) -> WorkspaceFuture<'a, ()>;

    /// Replace the content of `path` atomically: readers see either the
    /// old content or `content`, never a mix.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write_file<'a>(&'a self, path: &'a str, content: &'a str) -> WorkspaceFuture<'a, ()>;

    /// Read `path` as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the file does not exist.
    fn read_file<'a>(&'a self, path: &'a str) -> WorkspaceFuture<'a, String>;

    /// Run `command` to completion, streaming output into `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started. A non-zero exit
    /// is reported through [`ExecOutput::exit_code`], not as an error.
    fn exec<'a>(&'a self, command: &'a str, output: OutputSink) -> WorkspaceFuture<'a, ExecOutput>;

    /// Start `command` as a long-running process and return its preview
    /// endpoint once it is known. The process keeps running afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started or exits before
    /// announcing an endpoint.
    fn start_process<'a>(
        &'a self,
        command: &'a str,
        output: OutputSink,
    ) -> WorkspaceFuture<'a, PreviewInfo>;
}

/// Parent folder of a workspace path, or `None` for top-level entries.
#[must_use]
pub fn parent_dir(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}
