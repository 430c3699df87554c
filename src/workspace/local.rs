//! Workspace backed by a local directory and `tokio::process`.
//!
//! Commands run through the platform shell with the workspace root as
//! their working directory. Every child is spawned with
//! `kill_on_drop(true)`: dropping an `exec` future (for example on
//! timeout) terminates the command, and dropping the workspace stops
//! every process started with `start_process`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use regex::Regex;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::models::preview::PreviewInfo;
use crate::workspace::path_safety::resolve_path;
use crate::workspace::writer::write_atomic;
use crate::workspace::{
    ExecOutput, OutputChunk, OutputSink, OutputStream, Workspace, WorkspaceFuture,
};
use crate::{AppError, Result};

/// Longest single output line kept; longer lines are dropped with a warning.
pub const MAX_LINE_BYTES: usize = 1_048_576;

const URL_PATTERN: &str =
    r"https?://(?:localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1?\]):(?P<port>\d{2,5})";
const ANSI_PATTERN: &str = r"\x1b\[[0-9;?]*[A-Za-z]";

/// Directory-backed [`Workspace`].
pub struct LocalWorkspace {
    root: PathBuf,
    start_detect: Duration,
    url_pattern: Regex,
    ansi_pattern: Regex,
    processes: Mutex<Vec<Child>>,
}

impl LocalWorkspace {
    /// Create a workspace rooted at `root`.
    ///
    /// `start_detect` bounds how long `start_process` waits for the process
    /// to print a local URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `root` cannot be canonicalized.
    pub fn new(root: impl Into<PathBuf>, start_detect: Duration) -> Result<Self> {
        let root = root
            .into()
            .canonicalize()
            .map_err(|err| AppError::Config(format!("workspace root invalid: {err}")))?;
        let url_pattern = Regex::new(URL_PATTERN)
            .map_err(|err| AppError::Config(format!("invalid url pattern: {err}")))?;
        let ansi_pattern = Regex::new(ANSI_PATTERN)
            .map_err(|err| AppError::Config(format!("invalid ansi pattern: {err}")))?;

        Ok(Self {
            root,
            start_detect,
            url_pattern,
            ansi_pattern,
            processes: Mutex::new(Vec::new()),
        })
    }

    /// Create a workspace from runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the configured root is invalid.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        Self::new(&config.workspace_root, config.start_detect_timeout())
    }

    /// Canonical workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of processes started by `start_process` still held.
    #[must_use]
    pub fn running_processes(&self) -> usize {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Kill every process started by `start_process`.
    pub async fn stop_all(&self) {
        let children = std::mem::take(
            &mut *self
                .processes
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for mut child in children {
            if let Err(err) = child.kill().await {
                warn!(%err, pid = child.id().unwrap_or(0), "failed to kill started process");
            }
        }
    }

    /// Find a local preview URL in one line of process output.
    #[must_use]
    pub fn detect_preview(&self, line: &str) -> Option<PreviewInfo> {
        let plain = self.ansi_pattern.replace_all(line, "");
        let captures = self.url_pattern.captures(&plain)?;
        let port: u16 = captures.name("port")?.as_str().parse().ok()?;
        Some(PreviewInfo {
            port,
            base_url: format!("http://localhost:{port}"),
        })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        resolve_path(&self.root, path)
    }

    fn spawn_shell(&self, command: &str) -> Result<Child> {
        let mut cmd = shell_command(command);
        cmd.current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn()
            .map_err(|err| AppError::Workspace(format!("failed to spawn `{command}`: {err}")))
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Forward lines from `reader` to `sink` (and `lines`, if given) until EOF,
/// returning everything read.
async fn pump<R>(
    reader: R,
    stream: OutputStream,
    sink: OutputSink,
    lines: Option<mpsc::UnboundedSender<String>>,
) -> String
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
    let mut collected = String::new();

    while let Some(item) = framed.next().await {
        match item {
            Ok(line) => {
                let text = format!("{line}\n");
                collected.push_str(&text);
                if let Some(tx) = &lines {
                    // Receiver goes away once the preview URL is found.
                    let _ = tx.send(line);
                }
                let _ = sink.send(OutputChunk { stream, text });
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(?stream, "dropping output line longer than {MAX_LINE_BYTES} bytes");
            }
            Err(LinesCodecError::Io(err)) => {
                debug!(?stream, %err, "output stream closed with error");
                break;
            }
        }
    }

    collected
}

fn take_pipes(
    child: &mut Child,
) -> Result<(tokio::process::ChildStdout, tokio::process::ChildStderr)> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Workspace("child stdout was not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Workspace("child stderr was not captured".into()))?;
    Ok((stdout, stderr))
}

impl Workspace for LocalWorkspace {
    fn create_dir_all<'a>(&'a self, path: &'a str) -> WorkspaceFuture<'a, ()> {
        Box::pin(async move {
            let target = self.resolve(path)?;
            tokio::fs::create_dir_all(&target).await.map_err(|err| {
                AppError::Io(format!(
                    "failed to create directory {}: {err}",
                    target.display()
                ))
            })
        })
    }

    fn write_file<'a>(&'a self, path: &'a str, content: &'a str) -> WorkspaceFuture<'a, ()> {
        Box::pin(async move {
            let root = self.root.clone();
            let path_owned = path.to_owned();
            let content = content.to_owned();

            let summary = tokio::task::spawn_blocking(move || {
                write_atomic(&root, &path_owned, &content)
            })
            .await
            .map_err(|err| AppError::Io(format!("write task panicked: {err}")))??;

            debug!(
                path = %summary.path.display(),
                bytes = summary.bytes_written,
                "file written"
            );
            Ok(())
        })
    }

    fn read_file<'a>(&'a self, path: &'a str) -> WorkspaceFuture<'a, String> {
        Box::pin(async move {
            let target = self.resolve(path)?;
            tokio::fs::read_to_string(&target)
                .await
                .map_err(|err| match err.kind() {
                    std::io::ErrorKind::NotFound => AppError::NotFound(path.to_owned()),
                    _ => AppError::Io(format!("failed to read {}: {err}", target.display())),
                })
        })
    }

    fn exec<'a>(&'a self, command: &'a str, output: OutputSink) -> WorkspaceFuture<'a, ExecOutput> {
        Box::pin(async move {
            let mut child = self.spawn_shell(command)?;
            let (stdout, stderr) = take_pipes(&mut child)?;

            let (stdout, stderr, status) = tokio::join!(
                pump(stdout, OutputStream::Stdout, output.clone(), None),
                pump(stderr, OutputStream::Stderr, output, None),
                child.wait(),
            );
            let status = status
                .map_err(|err| AppError::Workspace(format!("failed to wait for `{command}`: {err}")))?;

            Ok(ExecOutput {
                stdout,
                stderr,
                exit_code: status.code().unwrap_or(-1),
            })
        })
    }

    fn start_process<'a>(
        &'a self,
        command: &'a str,
        output: OutputSink,
    ) -> WorkspaceFuture<'a, PreviewInfo> {
        Box::pin(async move {
            let mut child = self.spawn_shell(command)?;
            let (stdout, stderr) = take_pipes(&mut child)?;

            let (line_tx, mut line_rx) = mpsc::unbounded_channel();
            tokio::spawn(pump(
                stdout,
                OutputStream::Stdout,
                output.clone(),
                Some(line_tx.clone()),
            ));
            tokio::spawn(pump(stderr, OutputStream::Stderr, output, Some(line_tx)));

            let detected = tokio::time::timeout(self.start_detect, async {
                while let Some(line) = line_rx.recv().await {
                    if let Some(preview) = self.detect_preview(&line) {
                        return Some(preview);
                    }
                }
                None
            })
            .await;

            match detected {
                Ok(Some(preview)) => {
                    info!(
                        command,
                        port = preview.port,
                        pid = child.id().unwrap_or(0),
                        "started process reported preview"
                    );
                    self.processes
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(child);
                    Ok(preview)
                }
                Ok(None) => {
                    let code = child
                        .wait()
                        .await
                        .ok()
                        .and_then(|status| status.code())
                        .unwrap_or(-1);
                    Err(AppError::Workspace(format!(
                        "`{command}` exited with code {code} before reporting a URL"
                    )))
                }
                Err(_) => Err(AppError::Timeout(format!(
                    "`{command}` did not report a URL within {}s",
                    self.start_detect.as_secs()
                ))),
            }
        })
    }
}
