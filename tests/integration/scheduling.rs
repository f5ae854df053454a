//! Time-gated execution and ready-queue ordering.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Notify;

use conveyor::{TaskOptions, TaskStatus};

use crate::fixtures::*;

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduled_task_never_runs_early() {
    let queue = fifo_queue("sched-delay", 1);
    let before_submit = Utc::now();

    let id = queue
        .submit(
            ok_work(json!("late")),
            Value::Null,
            TaskOptions::new().scheduled_after(Duration::from_millis(400)),
        )
        .await
        .unwrap();
    assert_eq!(
        queue.get_task_status(id).await.unwrap(),
        TaskStatus::Scheduled
    );

    // Well before the gate: still parked.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        queue.get_task_status(id).await.unwrap(),
        TaskStatus::Scheduled
    );

    let result = queue
        .wait_for_task(id, Some(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();
    assert!(result.success);
    // Completion can only come after the time gate.
    assert!(result.timestamp >= before_submit + chrono::Duration::milliseconds(400));

    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduled_at_absolute_time() {
    let queue = fifo_queue("sched-absolute", 1);
    let when = Utc::now() + chrono::Duration::milliseconds(300);

    let id = queue
        .submit(
            ok_work(json!("on time")),
            Value::Null,
            TaskOptions::new().scheduled_at(when),
        )
        .await
        .unwrap();

    let result = queue
        .wait_for_task(id, Some(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();
    assert!(result.success);
    assert!(result.timestamp >= when);

    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduled_task_also_waits_for_dependencies() {
    let queue = fifo_queue("sched-deps", 2);
    let gate = Arc::new(Notify::new());

    let dep = queue
        .submit(gated_work(Arc::clone(&gate)), Value::Null, TaskOptions::new())
        .await
        .unwrap();
    let gated = queue
        .submit(
            ok_work(json!("both gates")),
            Value::Null,
            TaskOptions::new()
                .scheduled_after(Duration::from_millis(100))
                .depends_on([dep]),
        )
        .await
        .unwrap();

    // Time gate elapsed, dependency still unmet: stays scheduled.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        queue.get_task_status(gated).await.unwrap(),
        TaskStatus::Scheduled
    );

    gate.notify_one();
    let result = queue
        .wait_for_task(gated, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert!(result.unwrap().success);

    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_priority_mode_dequeues_ascending() {
    let queue = priority_queue("sched-priority", 1);
    let gate = Arc::new(Notify::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    // Occupy the single worker so the next three are simultaneously ready.
    let blocker = queue
        .submit(gated_work(Arc::clone(&gate)), Value::Null, TaskOptions::new())
        .await
        .unwrap();

    let mut ids = Vec::new();
    for priority in [5i64, 1, 3] {
        ids.push(
            queue
                .submit(
                    recording_work(&format!("p{priority}"), Arc::clone(&log)),
                    Value::Null,
                    TaskOptions::new().with_priority(priority),
                )
                .await
                .unwrap(),
        );
    }

    gate.notify_one();
    queue.wait_for_task(blocker, Some(Duration::from_secs(5))).await.unwrap();
    for id in ids {
        queue.wait_for_task(id, Some(Duration::from_secs(5))).await.unwrap();
    }

    assert_eq!(*log.lock().unwrap(), vec!["p1", "p3", "p5"]);

    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fifo_mode_ignores_priority() {
    let queue = fifo_queue("sched-fifo", 1);
    let gate = Arc::new(Notify::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let blocker = queue
        .submit(gated_work(Arc::clone(&gate)), Value::Null, TaskOptions::new())
        .await
        .unwrap();

    let mut ids = Vec::new();
    for (label, priority) in [("first", 9i64), ("second", 1), ("third", 5)] {
        ids.push(
            queue
                .submit(
                    recording_work(label, Arc::clone(&log)),
                    Value::Null,
                    TaskOptions::new().with_priority(priority),
                )
                .await
                .unwrap(),
        );
    }

    gate.notify_one();
    queue.wait_for_task(blocker, Some(Duration::from_secs(5))).await.unwrap();
    for id in ids {
        queue.wait_for_task(id, Some(Duration::from_secs(5))).await.unwrap();
    }

    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);

    queue.stop(true, Some(Duration::from_secs(5))).await.unwrap();
}
