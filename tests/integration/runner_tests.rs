//! Integration tests for `ActionRunner` against a recording workspace.
//!
//! Validates:
//! - Actions of one artifact complete in position order
//! - Locked paths are never written
//! - A failure skips the rest of its artifact only
//! - Streaming content never reaches the workspace
//! - Abort, timeout and re-dispatch of settled actions

use std::time::Duration;

use artifact_runner::models::action::{ActionKind, ActionStatus};
use artifact_runner::AppError;

use super::test_helpers::{action, file, harness, shell, Call};

// ─── ordering ────────────────────────────────────────────────────────

#[tokio::test]
async fn artifact_actions_complete_in_order() {
    let h = harness(120);
    h.workspace.delay("npm install", Duration::from_millis(50));

    let a1 = file("a", 0, "/index.js", "console.log(1)");
    let a2 = shell("a", 1, "npm install");
    let a3 = file("a", 2, "/src/app.js", "export {}");

    let handles = [h.runner.dispatch(&a1), h.runner.dispatch(&a2), h.runner.dispatch(&a3)];
    for handle in handles {
        let record = handle.wait().await.expect("record");
        assert_eq!(record.status, ActionStatus::Complete, "{}", record.id);
    }

    assert_eq!(
        h.runner.completion_order(),
        [a1.action_id.clone(), a2.action_id.clone(), a3.action_id.clone()]
    );
    assert_eq!(
        h.workspace.calls(),
        vec![
            Call::Write("/index.js".into(), "console.log(1)".into()),
            Call::Exec("npm install".into()),
            Call::CreateDir("/src".into()),
            Call::Write("/src/app.js".into(), "export {}".into()),
        ]
    );
}

#[tokio::test]
async fn later_action_waits_for_unclosed_earlier_action() {
    let h = harness(120);

    let first_open = action("a", 0, ActionKind::Shell, "npm i", false);
    assert_eq!(h.runner.enqueue(&first_open), ActionStatus::Streaming);

    let second = h.runner.dispatch(&file("a", 1, "/b.txt", "b"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.workspace.calls().is_empty(), "second action must wait");

    let first = h.runner.dispatch(&action("a", 0, ActionKind::Shell, "npm i", true));
    first.wait().await.expect("first");
    second.wait().await.expect("second");

    assert_eq!(
        h.runner.completion_order(),
        ["m-a-0".to_owned(), "m-a-1".to_owned()]
    );
}

#[tokio::test]
async fn execute_waits_for_completion() {
    let h = harness(120);
    let record = h
        .runner
        .execute(&file("a", 0, "/readme.md", "# hi"), false)
        .await
        .expect("record");

    assert_eq!(record.status, ActionStatus::Complete);
    assert!(record.started_at.is_some());
    assert!(record.finished_at >= record.started_at);
    assert_eq!(h.workspace.file("/readme.md").as_deref(), Some("# hi"));
}

// ─── files and locks ─────────────────────────────────────────────────

#[tokio::test]
async fn locked_path_is_never_written() {
    let h = harness(120);
    h.locks.lock_folder("/src");

    let record = h
        .runner
        .dispatch(&file("a", 0, "/src/a.js", "x"))
        .wait()
        .await
        .expect("record");

    assert_eq!(record.status, ActionStatus::Failed);
    assert!(matches!(record.failure, Some(AppError::LockedPath(ref msg)) if msg.contains("/src")));
    assert!(h.workspace.writes().is_empty());
    assert!(h.session.file("/src/a.js").is_none());
}

#[tokio::test]
async fn written_file_is_recorded_in_session() {
    let h = harness(120);
    h.runner
        .dispatch(&file("a", 0, "/src/lib/util.js", "util"))
        .wait()
        .await
        .expect("record");

    assert_eq!(h.workspace.calls()[0], Call::CreateDir("/src/lib".into()));
    assert!(h.session.file("/src/lib/util.js").is_some());
    assert!(h.session.file("/src").is_some_and(|e| e.is_folder()));
}

// ─── failure propagation ─────────────────────────────────────────────

#[tokio::test]
async fn failure_skips_rest_of_artifact() {
    let h = harness(120);
    h.workspace.script("npm test", 1, "1 failing");

    let failing = h.runner.dispatch(&shell("a", 0, "npm test"));
    let skipped = h.runner.dispatch(&file("a", 1, "/after.txt", "never"));
    let other = h.runner.dispatch(&file("b", 0, "/other.txt", "ok"));

    let failing = failing.wait().await.expect("failing");
    assert_eq!(failing.status, ActionStatus::Failed);
    assert_eq!(
        failing.failure,
        Some(AppError::ShellExecution {
            exit_code: 1,
            stderr: "1 failing".into()
        })
    );
    assert!(failing.output.contains("ran npm test"));

    let skipped = skipped.wait().await.expect("skipped");
    assert_eq!(skipped.status, ActionStatus::Skipped);

    let other = other.wait().await.expect("other");
    assert_eq!(other.status, ActionStatus::Complete);

    let late = h.runner.dispatch(&shell("a", 2, "echo late")).wait().await.expect("late");
    assert_eq!(late.status, ActionStatus::Skipped);

    assert_eq!(
        h.workspace.writes(),
        vec![("/other.txt".to_owned(), "ok".to_owned())]
    );
}

#[tokio::test]
async fn failed_start_marks_action_failed() {
    let h = harness(120);
    h.workspace.script("npm run dev", 2, "");

    let record = h
        .runner
        .dispatch(&action("a", 0, ActionKind::Start, "npm run dev", true))
        .wait()
        .await
        .expect("record");

    assert_eq!(record.status, ActionStatus::Failed);
    assert!(matches!(record.failure, Some(AppError::Workspace(_))));
    assert!(h.session.active_preview().is_none());
}

#[tokio::test]
async fn start_registers_preview() {
    let h = harness(120);
    let record = h
        .runner
        .dispatch(&action("a", 0, ActionKind::Start, "npm run dev", true))
        .wait()
        .await
        .expect("record");

    assert_eq!(record.status, ActionStatus::Complete);
    let preview = h.session.active_preview().expect("preview");
    assert_eq!(preview.port, 5173);
}

// ─── streaming ───────────────────────────────────────────────────────

#[tokio::test]
async fn streaming_content_is_never_committed() {
    let h = harness(120);
    let mut open = action(
        "a",
        0,
        ActionKind::File {
            file_path: "/a.js".into(),
        },
        "",
        false,
    );

    h.runner.enqueue(&open);
    for partial in ["con", "console", "console.lo"] {
        open.content = partial.into();
        let record = h.runner.execute(&open, true).await.expect("record");
        assert_eq!(record.status, ActionStatus::Streaming);
        assert_eq!(record.preview_content, partial);
        assert!(record.committed_content.is_none());
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.workspace.calls().is_empty());

    open.content = "console.log(1)".into();
    open.closed = true;
    let record = h.runner.execute(&open, false).await.expect("record");
    assert_eq!(record.committed_content.as_deref(), Some("console.log(1)"));
    assert_eq!(
        h.workspace.writes(),
        vec![("/a.js".to_owned(), "console.log(1)".to_owned())]
    );
}

// ─── dedup ───────────────────────────────────────────────────────────

#[tokio::test]
async fn settled_action_is_not_executed_again() {
    let h = harness(120);
    let a1 = file("a", 0, "/once.txt", "1");

    h.runner.dispatch(&a1).wait().await.expect("first");
    let again = h.runner.dispatch(&a1).wait().await.expect("second");

    assert_eq!(again.status, ActionStatus::Complete);
    assert_eq!(h.workspace.writes().len(), 1);
    assert_eq!(h.runner.enqueue(&a1), ActionStatus::Complete);
}

// ─── abort ───────────────────────────────────────────────────────────

#[tokio::test]
async fn abort_lets_running_action_finish() {
    let h = harness(120);
    h.workspace.delay("npm install", Duration::from_millis(200));

    let running = h.runner.dispatch(&shell("a", 0, "npm install"));
    let queued = h.runner.dispatch(&file("a", 1, "/x.txt", "x"));
    let streaming = action("b", 0, ActionKind::Shell, "ls", false);
    h.runner.enqueue(&streaming);

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.runner.abort();
    assert!(h.runner.is_aborted());

    let running = running.wait().await.expect("running");
    assert_eq!(running.status, ActionStatus::Complete);

    let queued = queued.wait().await.expect("queued");
    assert_eq!(queued.status, ActionStatus::Aborted);
    assert!(matches!(queued.failure, Some(AppError::Aborted(_))));

    assert_eq!(
        h.runner.action(&streaming.action_id).map(|r| r.status),
        Some(ActionStatus::Aborted)
    );

    let late = h.runner.dispatch(&file("c", 0, "/late.txt", "late")).wait().await.expect("late");
    assert_eq!(late.status, ActionStatus::Aborted);
    assert!(h.workspace.writes().is_empty());
}

#[tokio::test]
async fn abort_settles_action_waiting_on_streaming_predecessor() {
    let h = harness(120);
    let streaming = action("a", 0, ActionKind::Shell, "npm i", false);
    h.runner.enqueue(&streaming);

    let held = h.runner.dispatch(&file("a", 1, "/b.txt", "b"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.runner.abort();

    let record = tokio::time::timeout(Duration::from_secs(2), held.wait())
        .await
        .expect("held action settles after abort")
        .expect("record");
    assert_eq!(record.status, ActionStatus::Aborted);
    assert_eq!(
        h.runner.action(&streaming.action_id).map(|r| r.status),
        Some(ActionStatus::Aborted)
    );
    assert!(h.workspace.calls().is_empty());
}

// ─── timeout ─────────────────────────────────────────────────────────

#[tokio::test]
async fn slow_action_times_out_and_next_artifact_runs() {
    let h = harness(1);
    h.workspace.delay("sleep 10", Duration::from_secs(10));

    let slow = h.runner.dispatch(&shell("a", 0, "sleep 10"));
    let next = h.runner.dispatch(&file("b", 0, "/next.txt", "n"));

    let slow = slow.wait().await.expect("slow");
    assert_eq!(slow.status, ActionStatus::Failed);
    assert!(matches!(slow.failure, Some(AppError::Timeout(_))));

    let next = next.wait().await.expect("next");
    assert_eq!(next.status, ActionStatus::Complete);
}

// ─── shutdown ────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_drains_queue_and_rejects_new_work() {
    let h = harness(120);
    let queued = h.runner.dispatch(&file("a", 0, "/q.txt", "q"));

    h.runner.shutdown().await;
    assert_eq!(queued.wait().await.expect("queued").status, ActionStatus::Complete);

    let after = h.runner.dispatch(&file("a", 1, "/r.txt", "r")).wait().await.expect("after");
    assert_eq!(after.status, ActionStatus::Pending);
    assert_eq!(h.workspace.writes().len(), 1);

    let ids: Vec<String> = h.runner.actions().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["m-a-0", "m-a-1"]);
}
