//! Unit tests for `LockCoordinator` and the lock file loader.

use std::fs;

use artifact_runner::config::LockConfig;
use artifact_runner::locks::loader::LockFile;
use artifact_runner::locks::watcher::apply_lock_file;
use artifact_runner::locks::LockCoordinator;

// ─── is_locked ────────────────────────────────────────────────────────

#[test]
fn unlocked_by_default() {
    let locks = LockCoordinator::new();
    let status = locks.is_locked("/src/a.js");
    assert!(!status.locked);
    assert!(status.locked_by_folder.is_none());
}

#[test]
fn exact_file_lock() {
    let locks = LockCoordinator::new();
    assert!(locks.lock_file("src/a.js"));
    assert!(!locks.lock_file("/src/a.js"), "same path after normalization");

    let status = locks.is_locked("/src/a.js");
    assert!(status.locked);
    assert!(status.locked_by_folder.is_none());
    assert!(!locks.is_locked("/src/b.js").locked);
}

#[test]
fn folder_lock_covers_descendants_only() {
    let locks = LockCoordinator::new();
    locks.lock_folder("/src/");

    let nested = locks.is_locked("/src/components/App.jsx");
    assert!(nested.locked);
    assert_eq!(nested.locked_by_folder.as_deref(), Some("/src"));

    assert!(!locks.is_locked("/srcx/a.js").locked);
    assert!(!locks.is_locked("/other/src/a.js").locked);
}

#[test]
fn nearest_locked_folder_is_reported() {
    let locks = LockCoordinator::new();
    locks.lock_folder("/src");
    locks.lock_folder("/src/lib");

    let status = locks.is_locked("/src/lib/util.js");
    assert_eq!(status.locked_by_folder.as_deref(), Some("/src/lib"));
}

#[test]
fn root_folder_lock_covers_everything() {
    let locks = LockCoordinator::new();
    locks.lock_folder("/");
    assert!(locks.is_locked("/index.html").locked);
    assert!(locks.is_locked("/a/b/c.txt").locked);
}

#[test]
fn unlock_operations() {
    let locks = LockCoordinator::new();
    locks.lock_file("/a.txt");
    locks.lock_folder("/dir");
    locks.lock_file("/dir/keep.txt");

    assert!(locks.unlock_file("/a.txt"));
    assert!(!locks.unlock_file("/a.txt"));
    assert!(locks.unlock_folder("/dir"));

    assert!(!locks.is_locked("/a.txt").locked);
    assert!(!locks.is_locked("/dir/other.txt").locked);
    assert!(locks.is_locked("/dir/keep.txt").locked, "file lock survives folder unlock");
}

#[test]
fn replace_all_swaps_table() {
    let locks = LockCoordinator::new();
    locks.lock_file("/old.txt");
    locks.replace_all(&["new.txt".into()], &["/vendor/".into()]);

    let snapshot = locks.locked_paths();
    assert_eq!(snapshot.files, ["/new.txt"]);
    assert_eq!(snapshot.folders, ["/vendor"]);
    assert!(!locks.is_locked("/old.txt").locked);
}

#[test]
fn from_config_seeds_locks() {
    let locks = LockCoordinator::from_config(&LockConfig {
        files: vec!["/package.json".into()],
        folders: vec!["/.git".into()],
    });
    assert!(locks.is_locked("/package.json").locked);
    assert!(locks.is_locked("/.git/HEAD").locked);
}

// ─── lock file ────────────────────────────────────────────────────────

#[test]
fn missing_lock_file_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert_eq!(LockFile::load(&dir.path().join("locks.json")), LockFile::default());
}

#[test]
fn malformed_lock_file_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("locks.json");
    fs::write(&path, "{ not json").expect("write");
    assert_eq!(LockFile::load(&path), LockFile::default());
}

#[test]
fn lock_file_merges_with_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("locks.json");
    fs::write(&path, r#"{"files": ["/a.txt"], "folders": ["/src"]}"#).expect("write");

    let locks = LockCoordinator::new();
    let base = LockConfig {
        files: vec!["/b.txt".into()],
        folders: Vec::new(),
    };
    apply_lock_file(&locks, &path, &base);

    assert!(locks.is_locked("/a.txt").locked);
    assert!(locks.is_locked("/b.txt").locked);
    assert!(locks.is_locked("/src/x.js").locked);
}
