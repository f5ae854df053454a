//! Snapshot persistence across queue restarts.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use conveyor::{QueueConfig, Snapshot, TaskId, TaskOptions, TaskQueue, TaskStatus};

use crate::fixtures::*;

fn persistent_config(name: &str, path: PathBuf) -> QueueConfig {
    QueueConfig::new(name)
        .with_max_workers(2)
        .with_tick_ms(20)
        .with_persistence(Some(path))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_completed_set_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");

    let queue = TaskQueue::new(persistent_config("persist-restart", path.clone()));
    let mut completed_ids = Vec::new();
    for n in 0..3 {
        let id = queue
            .submit(ok_work(json!(n)), Value::Null, TaskOptions::new())
            .await
            .unwrap();
        queue.wait_for_task(id, Some(Duration::from_secs(5))).await.unwrap();
        completed_ids.push(id);
    }
    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();

    let snapshot = Snapshot::read(&path).unwrap().unwrap();
    assert_eq!(snapshot.completed.len(), 3);

    // A fresh queue restores the completed-id set but resurrects no tasks.
    let reloaded = TaskQueue::new(persistent_config("persist-restart", path));
    let stats = reloaded.stats().await;
    assert_eq!(stats.total_tasks, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.running, 0);

    // Restored history satisfies dependencies from the previous run.
    let dependent = reloaded
        .submit(
            ok_work(json!("after restart")),
            Value::Null,
            TaskOptions::new().depends_on([completed_ids[0]]),
        )
        .await
        .unwrap();
    let result = reloaded
        .wait_for_task(dependent, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert!(result.unwrap().success);

    reloaded.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pending_tasks_are_not_resurrected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");

    let queue = TaskQueue::new(persistent_config("persist-pending", path.clone()));
    // Blocked on an id that never completes: stays pending across stop.
    let blocked = queue
        .submit(
            ok_work(json!("blocked")),
            Value::Null,
            TaskOptions::new().depends_on([TaskId::new()]),
        )
        .await
        .unwrap();
    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
    assert_eq!(
        queue.get_task_status(blocked).await.unwrap(),
        TaskStatus::Pending
    );

    // The snapshot records it, but a fresh queue does not bring it back.
    let snapshot = Snapshot::read(&path).unwrap().unwrap();
    assert!(snapshot.tasks.iter().any(|t| t.id == blocked));

    let reloaded = TaskQueue::new(persistent_config("persist-pending", path));
    assert!(reloaded.get_task_status(blocked).await.is_err());
    let stats = reloaded.stats().await;
    assert_eq!(stats.total_tasks, 0);
    assert_eq!(stats.pending, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_snapshot_written_on_cancel() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");

    let queue = TaskQueue::new(persistent_config("persist-cancel", path.clone()));
    let id = queue
        .submit(
            ok_work(json!(1)),
            Value::Null,
            TaskOptions::new().scheduled_after(Duration::from_secs(60)),
        )
        .await
        .unwrap();
    queue.cancel_task(id).await.unwrap();

    let snapshot = Snapshot::read(&path).unwrap().unwrap();
    let record = snapshot.tasks.iter().find(|t| t.id == id).unwrap();
    assert_eq!(record.status, TaskStatus::Cancelled);
    assert!(!record.result.as_ref().unwrap().success);

    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_snapshot_excludes_nothing_needed_for_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");

    let queue = TaskQueue::new(persistent_config("persist-record", path.clone()));
    let id = queue
        .submit(
            ok_work(json!({"report": "weekly"})),
            Value::Null,
            TaskOptions::new()
                .with_priority(2)
                .with_metadata("source", json!("cron")),
        )
        .await
        .unwrap();
    queue.wait_for_task(id, Some(Duration::from_secs(5))).await.unwrap();
    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();

    let snapshot = Snapshot::read(&path).unwrap().unwrap();
    let record = snapshot.tasks.iter().find(|t| t.id == id).unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.priority, 2);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.metadata["source"], json!("cron"));
    assert_eq!(
        record.result.as_ref().unwrap().value,
        Some(json!({"report": "weekly"}))
    );
    assert!(record.started_at.is_some());
    assert!(record.completed_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_corrupt_snapshot_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");
    std::fs::write(&path, "definitely not json").unwrap();

    // Load failure is best-effort: the queue comes up empty and works.
    let queue = TaskQueue::new(persistent_config("persist-corrupt", path));
    let id = queue
        .submit(ok_work(json!(1)), Value::Null, TaskOptions::new())
        .await
        .unwrap();
    let result = queue
        .wait_for_task(id, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert!(result.unwrap().success);

    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clear_completed_does_not_erase_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.json");

    let queue = TaskQueue::new(persistent_config("persist-clear", path.clone()));
    let id = queue
        .submit(ok_work(json!(1)), Value::Null, TaskOptions::new())
        .await
        .unwrap();
    queue.wait_for_task(id, Some(Duration::from_secs(5))).await.unwrap();

    assert_eq!(queue.clear_completed().await, 1);

    // The task record is gone, the completed-id set is not.
    let snapshot = Snapshot::read(&path).unwrap().unwrap();
    assert!(snapshot.tasks.is_empty());
    assert!(snapshot.completed.contains(&id));

    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}
