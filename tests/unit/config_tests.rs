use std::time::Duration;

use artifact_runner::{config::RuntimeConfig, AppError};

fn toml_for(workspace: &std::path::Path, extra: &str) -> String {
    format!(
        "workspace_root = '{}'\n{extra}",
        workspace.display().to_string().replace('\\', "\\\\")
    )
}

#[test]
fn minimal_config_uses_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = RuntimeConfig::from_toml_str(&toml_for(dir.path(), "")).expect("valid config");

    assert_eq!(config.action_timeout(), Some(Duration::from_secs(120)));
    assert_eq!(config.start_detect_timeout(), Duration::from_secs(30));
    assert!(!config.reprocess_finished_messages);
    assert_eq!(config.hidden_files.len(), 3);
    assert!(config.locks.files.is_empty());
    assert_eq!(
        config.workspace_root,
        dir.path().canonicalize().expect("canonicalize")
    );
    assert!(config
        .lock_file_path()
        .ends_with(".artifact-runner/locks.json"));
}

#[test]
fn full_config_parses() {
    let dir = tempfile::tempdir().expect("tempdir");
    let extra = r#"
action_timeout_seconds = 0
start_detect_seconds = 5
reprocess_finished_messages = true
hidden_files = ['/dist/']
lock_file = "locks.json"

[locks]
files = ["/package.json"]
folders = ["/.git"]
"#;
    let config = RuntimeConfig::from_toml_str(&toml_for(dir.path(), extra)).expect("valid config");

    assert_eq!(config.action_timeout(), None);
    assert_eq!(config.start_detect_timeout(), Duration::from_secs(5));
    assert!(config.reprocess_finished_messages);
    assert_eq!(config.locks.files, ["/package.json"]);
    assert_eq!(config.locks.folders, ["/.git"]);
    assert_eq!(config.hidden_file_patterns().expect("patterns").len(), 1);
}

#[test]
fn missing_workspace_root_is_rejected() {
    let result = RuntimeConfig::from_toml_str("action_timeout_seconds = 3");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn nonexistent_workspace_root_is_rejected() {
    let result = RuntimeConfig::from_toml_str("workspace_root = '/definitely/not/here/xyz'");
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("workspace_root")));
}

#[test]
fn invalid_hidden_pattern_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = RuntimeConfig::from_toml_str(&toml_for(dir.path(), "hidden_files = ['(']"));
    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("hidden_files")));
}

#[test]
fn absolute_lock_file_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = RuntimeConfig::from_toml_str(&toml_for(dir.path(), "lock_file = '/etc/locks.json'"));
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn workspace_override_is_validated() {
    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    let mut config = RuntimeConfig::for_workspace(first.path()).expect("config");

    config
        .override_workspace_root(second.path())
        .expect("override");
    assert_eq!(
        config.workspace_root,
        second.path().canonicalize().expect("canonicalize")
    );

    let missing = second.path().join("missing");
    assert!(config.override_workspace_root(&missing).is_err());
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, toml_for(dir.path(), "start_detect_seconds = 9")).expect("write");

    let config = RuntimeConfig::load_from_path(&path).expect("load");
    assert_eq!(config.start_detect_seconds, 9);

    let missing = RuntimeConfig::load_from_path(dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(AppError::Config(_))));
}
