#![forbid(unsafe_code)]

//! `artifact-runner` binary.
//!
//! Replays a model response transcript through the streaming parser in
//! chunks, executes the actions it contains against a local workspace and
//! prints the narrative text to stdout.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use artifact_runner::locks::watcher::LockWatcher;
use artifact_runner::locks::LockCoordinator;
use artifact_runner::models::message::Message;
use artifact_runner::runner::ActionRunner;
use artifact_runner::session::pipeline::{MessagePipeline, ParsedText};
use artifact_runner::session::SessionState;
use artifact_runner::workspace::local::LocalWorkspace;
use artifact_runner::workspace::Workspace;
use artifact_runner::{AppError, Result, RuntimeConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "artifact-runner", about = "Run the actions embedded in a model response", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workspace root; overrides `workspace_root` from the config file.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Model response to replay (`-` reads stdin).
    #[arg(long)]
    transcript: PathBuf,

    /// Characters per simulated stream chunk (0 feeds the whole text at once).
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Message id used for the transcript.
    #[arg(long, default_value = "transcript")]
    message_id: String,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("artifact-runner bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = load_config(args.config.as_deref(), args.workspace.as_deref())?;
    info!(root = %config.workspace_root.display(), "configuration loaded");

    // ── Locks ───────────────────────────────────────────
    let locks = Arc::new(LockCoordinator::from_config(&config.locks));
    let _lock_watcher = match LockWatcher::new(
        &config.lock_file_path(),
        Arc::clone(&locks),
        config.locks.clone(),
    ) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            warn!(%err, "lock file watching disabled");
            None
        }
    };

    // ── Runner and pipeline ─────────────────────────────
    let workspace = Arc::new(LocalWorkspace::from_config(&config)?);
    let session = Arc::new(SessionState::new());
    let runner = Arc::new(ActionRunner::spawn(
        &config,
        Arc::clone(&workspace) as Arc<dyn Workspace>,
        locks,
        Arc::clone(&session),
    ));
    let mut pipeline = MessagePipeline::new(&config, Arc::clone(&runner), Arc::clone(&session));

    let signal_runner = Arc::clone(&runner);
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_runner.abort();
    });

    // ── Replay the transcript ───────────────────────────
    let transcript = read_transcript(&args.transcript)?;
    let mut stdout = std::io::stdout();
    for end in chunk_ends(&transcript, args.chunk_size) {
        if runner.is_aborted() {
            break;
        }
        let message = Message::assistant(&args.message_id, &transcript[..end]);
        print_updates(&mut stdout, &pipeline.parse_messages(&[message], true))?;
        tokio::task::yield_now().await;
    }

    if !runner.is_aborted() {
        let message = Message::assistant(&args.message_id, transcript.as_str());
        print_updates(&mut stdout, &pipeline.parse_messages(&[message], false))?;
        let released = pipeline.finish(&args.message_id);
        write_out(&mut stdout, &released)?;
    }
    write_out(&mut stdout, "\n")?;

    pipeline.settle().await;
    runner.shutdown().await;
    log_summary(&runner, &session);

    // ── Keep started processes alive until interrupted ──
    if session.active_preview().is_some() && !runner.is_aborted() {
        info!("preview running; press ctrl-c to stop");
        if let Err(err) = signal_task.await {
            error!(%err, "signal task failed");
        }
    } else {
        signal_task.abort();
    }
    workspace.stop_all().await;

    info!("artifact-runner shut down");
    Ok(())
}

fn load_config(config: Option<&Path>, workspace: Option<&Path>) -> Result<RuntimeConfig> {
    match (config, workspace) {
        (Some(path), workspace) => {
            let mut config = RuntimeConfig::load_from_path(path)?;
            if let Some(root) = workspace {
                config.override_workspace_root(root)?;
            }
            Ok(config)
        }
        (None, Some(root)) => RuntimeConfig::for_workspace(root),
        (None, None) => Err(AppError::Config(
            "either --config or --workspace is required".into(),
        )),
    }
}

fn read_transcript(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .map_err(|err| AppError::Io(format!("failed to read stdin: {err}")))?;
        return Ok(raw);
    }
    std::fs::read_to_string(path).map_err(|err| {
        AppError::Io(format!(
            "failed to read transcript {}: {err}",
            path.display()
        ))
    })
}

/// Byte offsets at which each simulated chunk ends, on char boundaries.
fn chunk_ends(text: &str, chunk_size: usize) -> Vec<usize> {
    if chunk_size == 0 {
        return vec![text.len()];
    }
    let mut ends: Vec<usize> = text
        .char_indices()
        .map(|(index, _)| index)
        .skip(chunk_size)
        .step_by(chunk_size)
        .collect();
    ends.push(text.len());
    ends
}

fn print_updates(out: &mut impl Write, updates: &[ParsedText]) -> Result<()> {
    for update in updates {
        if update.replaced {
            // Text was rebuilt from scratch and already printed incrementally.
            continue;
        }
        write_out(out, &update.text)?;
    }
    Ok(())
}

fn write_out(out: &mut impl Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|err| AppError::Io(format!("failed to write stdout: {err}")))
}

fn log_summary(runner: &ActionRunner, session: &SessionState) {
    let actions = runner.actions();
    for record in &actions {
        match &record.failure {
            Some(err) => warn!(
                action_id = record.id,
                kind = record.kind.name(),
                status = record.status.as_str(),
                %err,
                "action summary"
            ),
            None => info!(
                action_id = record.id,
                kind = record.kind.name(),
                status = record.status.as_str(),
                "action summary"
            ),
        }
    }
    info!(
        actions = actions.len(),
        files = session.files().len(),
        previews = session.previews().len(),
        "run finished"
    );
    if let Some(preview) = session.active_preview() {
        info!(port = preview.port, base_url = %preview.base_url, "active preview");
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
