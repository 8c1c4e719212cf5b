//! End-to-end coordinator scenarios, driven directly against the actor
//! through `CoordinatorHandle` — no real sockets or worker processes.

use std::time::Duration;

use uuid::Uuid;
use workmesh::checkpoint::checkpoint_checksum;
use workmesh::config::CoordinatorConfig;
use workmesh::coordinator::CoordinatorHandle;
use workmesh::model::{ExecutionCheckpoint, MigrationType, NodeRole, TaskStatus, Variables};

fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        port: 0,
        heartbeat_timeout: Duration::from_millis(300),
        check_interval: Duration::from_millis(40),
        checkpoint_interval_steps: 10,
        auto_migration_cpu_threshold: 90.0,
        auto_migration_duration: Duration::from_millis(250),
        snapshot_timeout: Duration::from_millis(150),
    }
}

async fn two_workers(handle: &CoordinatorHandle) -> (uuid::Uuid, uuid::Uuid) {
    let w1 = handle.register_node("w1", NodeRole::Worker, "10.0.0.1:1").await;
    let w2 = handle.register_node("w2", NodeRole::Worker, "10.0.0.2:1").await;
    (w1, w2)
}

fn checkpoint_for(task_id: Uuid, node_id: Uuid, step: u64, total: u64) -> ExecutionCheckpoint {
    let variables = Variables::default();
    let checksum = checkpoint_checksum(task_id, step, total, &variables);
    ExecutionCheckpoint {
        id: Uuid::new_v4(),
        task_id,
        current_step: step,
        total_steps: total,
        variables,
        source_node_id: node_id,
        created_at: chrono::Utc::now(),
        checksum: Some(checksum),
    }
}

#[tokio::test]
async fn weak_migration_reassigns_without_checkpoint() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, w2) = two_workers(&handle).await;
    handle.register_bundle("counting", "3", "count to three").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Weak)
        .await
        .unwrap();

    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    assert_eq!(task.current_node_id, Some(w1));

    handle
        .request_migration(task_id, w1, w2, MigrationType::Weak)
        .await
        .expect("weak migration should succeed");

    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    assert_eq!(task.current_node_id, Some(w2));
    assert_eq!(task.status, TaskStatus::Running);
}

#[tokio::test]
async fn strong_migration_commits_on_checkpoint() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, w2) = two_workers(&handle).await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Strong)
        .await
        .unwrap();

    let migration_handle = handle.clone();
    let migration = tokio::spawn(async move {
        migration_handle.request_migration(task_id, w1, w2, MigrationType::Strong).await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.checkpoint_saved(checkpoint_for(task_id, w1, 4, 10)).await;

    let result = migration.await.unwrap();
    assert!(result.is_ok());

    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    assert_eq!(task.current_node_id, Some(w2));
    assert_eq!(task.status, TaskStatus::Running);
    assert!((task.progress - 0.4).abs() < 0.01);
}

#[tokio::test]
async fn strong_migration_times_out_without_checkpoint() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, w2) = two_workers(&handle).await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Strong)
        .await
        .unwrap();

    let result = handle.request_migration(task_id, w1, w2, MigrationType::Strong).await;
    assert!(result.is_err());

    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    // Source is still online, so the task reverts to running on w1.
    assert_eq!(task.current_node_id, Some(w1));
    assert_eq!(task.status, TaskStatus::Running);
}

#[tokio::test]
async fn strong_migration_rejects_tampered_checksum() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, w2) = two_workers(&handle).await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Strong)
        .await
        .unwrap();

    let migration_handle = handle.clone();
    let migration = tokio::spawn(async move {
        migration_handle.request_migration(task_id, w1, w2, MigrationType::Strong).await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut tampered = checkpoint_for(task_id, w1, 4, 10);
    tampered.variables.insert("extra".to_string(), serde_json::json!("tamper"));
    handle.checkpoint_saved(tampered).await;

    let result = migration.await.unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn concurrent_migration_request_is_rejected() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, w2) = two_workers(&handle).await;
    let w3 = handle.register_node("w3", NodeRole::Worker, "10.0.0.3:1").await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Strong)
        .await
        .unwrap();

    let migration_handle = handle.clone();
    let first = tokio::spawn(async move {
        migration_handle.request_migration(task_id, w1, w2, MigrationType::Strong).await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = handle.request_migration(task_id, w1, w3, MigrationType::Strong).await;
    assert!(second.is_err());

    handle.checkpoint_saved(checkpoint_for(task_id, w1, 1, 10)).await;
    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn worker_failure_recovers_strong_task_from_latest_checkpoint() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, w2) = two_workers(&handle).await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Strong)
        .await
        .unwrap();

    handle.checkpoint_saved(checkpoint_for(task_id, w1, 6, 10)).await;
    handle.disconnect(w1).await;

    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    assert_eq!(task.current_node_id, Some(w2));
    assert_eq!(task.status, TaskStatus::Running);
    assert!((task.progress - 0.6).abs() < 0.01);
    assert!(!snapshot.nodes.iter().any(|n| n.id == w1));
}

#[tokio::test]
async fn worker_failure_with_no_target_marks_task_failed() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let w1 = handle.register_node("only", NodeRole::Worker, "10.0.0.1:1").await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Weak)
        .await
        .unwrap();

    handle.disconnect(w1).await;

    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
}

#[tokio::test]
async fn submit_with_no_workers_surfaces_no_worker_available() {
    let handle = CoordinatorHandle::spawn(fast_config());
    handle.register_bundle("counting", "10", "count to ten").await;

    let result = handle.submit_task("count", "counting", None, MigrationType::Weak).await;
    let err = result.expect_err("submission with zero workers should fail");
    let task_id = match err {
        workmesh::coordinator::CoordinatorError::NoWorkerAvailable(task_id) => task_id,
        other => panic!("expected NoWorkerAvailable, got {other:?}"),
    };

    // The task is still recorded, left pending for a later sweep to assign.
    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.current_node_id, None);
}

#[tokio::test]
async fn sustained_overload_triggers_auto_migration() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, w2) = two_workers(&handle).await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Strong)
        .await
        .unwrap();

    handle.node_stats_sample(w1, 97.0, 10.0).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.checkpoint_saved(checkpoint_for(task_id, w1, 2, 10)).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    assert_eq!(task.current_node_id, Some(w2));
}

#[tokio::test]
async fn request_checkpoint_sends_to_the_owning_node() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let w1 = handle.register_node("w1", NodeRole::Worker, "10.0.0.1:1").await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel();
    handle.connect_sender(w1, out_tx).await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Strong)
        .await
        .unwrap();
    // Drain the task:assign envelope sent at submission time.
    out_rx.recv().await.unwrap();

    handle.request_checkpoint(task_id).await;

    let envelope = out_rx.recv().await.unwrap();
    assert_eq!(envelope.event, workmesh::protocol::EventKind::CheckpointSave);
    assert_eq!(envelope.payload["task_id"], task_id.to_string());
}

#[tokio::test]
async fn registry_stats_reflect_bundles_and_checkpoints() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, _w2) = two_workers(&handle).await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let stats = handle.registry_stats().await;
    assert_eq!(stats.total_bundles, 1);
    assert_eq!(stats.total_checkpoints, 0);

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Strong)
        .await
        .unwrap();
    handle.checkpoint_saved(checkpoint_for(task_id, w1, 1, 10)).await;

    let stats = handle.registry_stats().await;
    assert_eq!(stats.total_checkpoints, 1);
}

#[tokio::test]
async fn heartbeat_timeout_recovers_task_automatically() {
    let handle = CoordinatorHandle::spawn(fast_config());
    let (w1, w2) = two_workers(&handle).await;
    handle.register_bundle("counting", "10", "count to ten").await;

    let task_id = handle
        .submit_task("count", "counting", None, MigrationType::Weak)
        .await
        .unwrap();

    // Keep w2 alive, let w1 go stale past heartbeat_timeout.
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.heartbeat(w2).await;
    }

    let snapshot = handle.snapshot().await;
    let task = snapshot.tasks.iter().find(|t| t.id == task_id).unwrap();
    assert_eq!(task.current_node_id, Some(w2));
    assert_eq!(task.status, TaskStatus::Running);
}
