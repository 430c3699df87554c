//! Integration tests for `LocalWorkspace` against a temporary directory.
//!
//! Validates:
//! - Commands run in the workspace root and stream their output
//! - Non-zero exits are reported with captured stderr
//! - Files are written inside the root and read back
//! - Paths escaping the root are rejected
//! - Started processes report their preview URL

use std::time::Duration;

use artifact_runner::workspace::local::LocalWorkspace;
use artifact_runner::workspace::{OutputStream, Workspace};
use artifact_runner::AppError;
use tokio::sync::mpsc;

fn workspace(dir: &tempfile::TempDir) -> LocalWorkspace {
    LocalWorkspace::new(dir.path(), Duration::from_secs(5)).expect("workspace")
}

// ─── files ───────────────────────────────────────────────────────────

#[tokio::test]
async fn write_then_read_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = workspace(&dir);

    ws.create_dir_all("/src/lib").await.expect("mkdir");
    ws.write_file("/src/lib/a.txt", "hello").await.expect("write");

    assert_eq!(ws.read_file("/src/lib/a.txt").await.expect("read"), "hello");
    let on_disk = std::fs::read_to_string(dir.path().join("src/lib/a.txt")).expect("on disk");
    assert_eq!(on_disk, "hello");
}

#[tokio::test]
async fn overwrite_replaces_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = workspace(&dir);

    ws.write_file("/a.txt", "first").await.expect("write");
    ws.write_file("/a.txt", "second").await.expect("overwrite");

    assert_eq!(ws.read_file("/a.txt").await.expect("read"), "second");
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = workspace(&dir);

    let err = ws.read_file("/nope.txt").await.expect_err("missing");
    assert_eq!(err, AppError::NotFound("/nope.txt".into()));
}

#[tokio::test]
async fn escaping_paths_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = workspace(&dir);

    let err = ws.read_file("../outside.txt").await.expect_err("escape");
    assert!(matches!(err, AppError::PathViolation(_)), "{err}");
}

// ─── commands ────────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn exec_runs_in_root_and_streams_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("marker.txt"), "x").expect("marker");
    let ws = workspace(&dir);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let output = ws.exec("ls && echo oops >&2", tx).await.expect("exec");

    assert!(output.success());
    assert!(output.stdout.contains("marker.txt"));
    assert_eq!(output.stderr, "oops\n");

    let mut streams = Vec::new();
    while let Some(chunk) = rx.recv().await {
        streams.push(chunk.stream);
    }
    assert!(streams.contains(&OutputStream::Stdout));
    assert!(streams.contains(&OutputStream::Stderr));
}

#[cfg(unix)]
#[tokio::test]
async fn exec_reports_non_zero_exit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = workspace(&dir);
    let (tx, _rx) = mpsc::unbounded_channel();

    let output = ws.exec("echo bad >&2; exit 3", tx).await.expect("exec");

    assert!(!output.success());
    assert_eq!(output.exit_code, 3);
    assert_eq!(output.stderr.trim(), "bad");
}

#[cfg(unix)]
#[tokio::test]
async fn start_process_detects_preview_url() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = workspace(&dir);
    let (tx, _rx) = mpsc::unbounded_channel();

    let preview = ws
        .start_process(
            "printf '\\033[32m  Local: http://localhost:4321/\\033[0m\\n'; sleep 30",
            tx,
        )
        .await
        .expect("preview");

    assert_eq!(preview.port, 4321);
    assert_eq!(preview.base_url, "http://localhost:4321");
    assert_eq!(ws.running_processes(), 1);

    ws.stop_all().await;
    assert_eq!(ws.running_processes(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn start_process_without_url_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = workspace(&dir);
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = ws.start_process("echo no url here", tx).await.expect_err("no url");
    assert!(matches!(err, AppError::Workspace(_)), "{err}");
}

#[cfg(unix)]
#[tokio::test]
async fn start_process_times_out_while_silent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = LocalWorkspace::new(dir.path(), Duration::from_millis(200)).expect("workspace");
    let (tx, _rx) = mpsc::unbounded_channel();

    let err = ws.start_process("sleep 5", tx).await.expect_err("silent");
    assert!(matches!(err, AppError::Timeout(_)), "{err}");
}

// ─── preview detection ───────────────────────────────────────────────

#[test]
fn detect_preview_recognizes_local_hosts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ws = workspace(&dir);

    for (line, port) in [
        ("Local:   http://localhost:5173/", 5173),
        ("listening on http://127.0.0.1:3000", 3000),
        ("ready - started server on 0.0.0.0:8080, url: http://0.0.0.0:8080", 8080),
    ] {
        assert_eq!(ws.detect_preview(line).map(|p| p.port), Some(port), "{line}");
    }
    assert!(ws.detect_preview("\u{1b}[1mhttp://localhost:\u{1b}[0m").is_none());
    assert!(ws.detect_preview("see https://example.com:443").is_none());
    assert_eq!(
        ws.detect_preview("\u{1b}[36mhttp://localhost:\u{1b}[1m4000\u{1b}[22m/")
            .map(|p| p.port),
        Some(4000)
    );
}
