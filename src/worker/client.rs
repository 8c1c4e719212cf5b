//! Websocket control-channel client: registers with the coordinator, reports
//! heartbeats and host stats on a timer, and drives at most one task at a
//! time through the execution runtime.

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use sysinfo::System;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::checkpoint::checkpoint_checksum;
use crate::config::WorkerConfig;
use crate::model::{ExecutionCheckpoint, NodeId, NodeRole};
use crate::protocol::{
    CheckpointSaveRequest, Envelope, EventKind, NodeRegistration, NodeStats, PauseRequest,
    TaskAssignment, TaskCompleteReport, TaskErrorReport, TaskProgressReport,
};
use crate::worker::error::WorkerError;
use crate::worker::runtime::{ControlSignal, ExecutionContext, RunOutcome};
use crate::worker::tasks;

struct CurrentTask {
    task_id: crate::model::TaskId,
    control_tx: watch::Sender<ControlSignal>,
    snapshot_tx: watch::Sender<u64>,
}

pub async fn run(config: WorkerConfig) -> Result<(), WorkerError> {
    let (stream, _response) = tokio_tungstenite::connect_async(&config.coordinator_url)
        .await
        .map_err(|e| WorkerError::Connect(e.to_string()))?;
    let (mut sink, mut source) = stream.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Envelope>();
    let forward = tokio::spawn(async move {
        while let Some(envelope) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&envelope) else { continue };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let address = config
        .worker_id
        .clone()
        .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));
    let _ = out_tx.send(Envelope::new(
        EventKind::NodeRegister,
        NodeRegistration { name: config.worker_name.clone(), role: NodeRole::Worker, address },
    ));

    let node_id = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Ok(envelope) = serde_json::from_str::<Envelope>(&text) {
                    if envelope.event == EventKind::NodeRegistered {
                        let id: NodeId = serde_json::from_value(envelope.payload["node_id"].clone())
                            .map_err(WorkerError::Protocol)?;
                        break id;
                    }
                }
            }
            Some(Ok(_)) => continue,
            _ => return Err(WorkerError::ChannelClosed),
        }
    };

    let heartbeat_tx = out_tx.clone();
    let interval = config.heartbeat_interval;
    tokio::spawn(async move {
        let mut system = System::new_all();
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            system.refresh_cpu_usage();
            system.refresh_memory();
            let cpu_usage = system.global_cpu_usage();
            let memory_usage = if system.total_memory() > 0 {
                (system.used_memory() as f32 / system.total_memory() as f32) * 100.0
            } else {
                0.0
            };
            if heartbeat_tx
                .send(Envelope::new(EventKind::NodeHeartbeat, serde_json::json!({})))
                .is_err()
            {
                break;
            }
            let _ = heartbeat_tx.send(Envelope::new(
                EventKind::NodeStats,
                NodeStats { node_id, cpu_usage, memory_usage },
            ));
        }
    });

    // Signalled by a spawned execution when it completes or pauses, so the
    // worker knows it's free to accept another assignment again.
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<crate::model::TaskId>();

    let mut current: Option<CurrentTask> = None;
    loop {
        tokio::select! {
            message = source.next() => {
                let Some(message) = message else { break };
                let Ok(Message::Text(text)) = message else { continue };
                let Ok(envelope) = serde_json::from_str::<Envelope>(&text) else {
                    tracing::warn!("dropping malformed control-channel frame");
                    continue;
                };
                match envelope.event {
                    EventKind::TaskAssign => {
                        let Ok(assignment) = serde_json::from_value::<TaskAssignment>(envelope.payload) else {
                            continue;
                        };
                        // §4.2: a worker runs at most one task concurrently;
                        // a second assignment while busy is rejected, never
                        // silently preempted.
                        if let Some(report) =
                            busy_rejection(current.as_ref().map(|t| t.task_id), assignment.task.id)
                        {
                            tracing::warn!(
                                incoming = %assignment.task.id,
                                busy_with = ?current.as_ref().map(|t| t.task_id),
                                "rejecting task:assign while already busy"
                            );
                            let _ = out_tx.send(Envelope::new(EventKind::TaskError, report));
                            continue;
                        }
                        let (control_tx, control_rx) = watch::channel(ControlSignal::Run);
                        let (snapshot_tx, snapshot_rx) = watch::channel(0u64);
                        current = Some(CurrentTask { task_id: assignment.task.id, control_tx, snapshot_tx });
                        spawn_execution(
                            assignment,
                            node_id,
                            config.checkpoint_interval_steps,
                            control_rx,
                            snapshot_rx,
                            out_tx.clone(),
                            done_tx.clone(),
                        );
                    }
                    EventKind::TaskPause => {
                        let Ok(pause) = serde_json::from_value::<PauseRequest>(envelope.payload) else {
                            continue;
                        };
                        if let Some(task) = &current {
                            if task.task_id == pause.task_id {
                                let _ = task
                                    .control_tx
                                    .send(ControlSignal::Pause { require_snapshot: pause.require_snapshot });
                            }
                        }
                    }
                    EventKind::CheckpointSave => {
                        let Ok(request) = serde_json::from_value::<CheckpointSaveRequest>(envelope.payload) else {
                            continue;
                        };
                        if let Some(task) = &current {
                            if task.task_id == request.task_id {
                                let next = *task.snapshot_tx.borrow() + 1;
                                let _ = task.snapshot_tx.send(next);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Some(finished) = done_rx.recv() => {
                if current.as_ref().is_some_and(|task| task.task_id == finished) {
                    current = None;
                }
            }
        }
    }

    forward.abort();
    Ok(())
}

/// Returns the `task:error` report to send back when a `task:assign` arrives
/// while a task is already running, or `None` if the worker is free to take it.
fn busy_rejection(
    busy_with: Option<crate::model::TaskId>,
    incoming: crate::model::TaskId,
) -> Option<TaskErrorReport> {
    let busy_with = busy_with?;
    Some(TaskErrorReport {
        task_id: incoming,
        message: format!("worker busy with task {busy_with}"),
    })
}

fn spawn_execution(
    assignment: TaskAssignment,
    node_id: NodeId,
    checkpoint_interval_steps: u64,
    mut control_rx: watch::Receiver<ControlSignal>,
    mut snapshot_rx: watch::Receiver<u64>,
    out_tx: mpsc::UnboundedSender<Envelope>,
    done_tx: mpsc::UnboundedSender<crate::model::TaskId>,
) {
    // Checkpointing is enabled only for strong-migration tasks (§4.5); a
    // weak task never emits a periodic checkpoint regardless of cadence.
    let interval = matches!(assignment.task.migration_type, crate::model::MigrationType::Strong)
        .then_some(checkpoint_interval_steps);
    tokio::spawn(async move {
        let task_id = assignment.task.id;
        let mut exec_task = match tasks::build(&assignment.code_bundle.name, &assignment.code_bundle.code) {
            Ok(task) => task,
            Err(err) => {
                let _ = out_tx.send(Envelope::new(
                    EventKind::TaskError,
                    TaskErrorReport { task_id, message: err.to_string() },
                ));
                // The worker is free to accept another assignment again.
                let _ = done_tx.send(task_id);
                return;
            }
        };
        if let Some(checkpoint) = &assignment.checkpoint {
            exec_task.resume_from(checkpoint.current_step, &checkpoint.variables);
        }

        let ctx = ExecutionContext::new(task_id);
        let out_tx_progress = out_tx.clone();
        let out_tx_snapshot = out_tx.clone();
        let outcome = ctx
            .run(
                &mut *exec_task,
                &mut control_rx,
                &mut snapshot_rx,
                interval,
                move |current_step, total_steps| {
                    let _ = out_tx_progress.send(Envelope::new(
                        EventKind::TaskProgress,
                        TaskProgressReport { task_id, current_step, total_steps },
                    ));
                },
                move |current_step, total_steps, variables| {
                    let checksum = checkpoint_checksum(task_id, current_step, total_steps, &variables);
                    let checkpoint = ExecutionCheckpoint {
                        id: Uuid::new_v4(),
                        task_id,
                        current_step,
                        total_steps,
                        variables,
                        source_node_id: node_id,
                        created_at: Utc::now(),
                        checksum: Some(checksum),
                    };
                    let _ = out_tx_snapshot.send(Envelope::new(EventKind::CheckpointSaved, checkpoint));
                },
            )
            .await;

        match outcome {
            RunOutcome::Completed(result) => {
                let _ = out_tx.send(Envelope::new(EventKind::TaskComplete, TaskCompleteReport { task_id, result }));
            }
            RunOutcome::Paused { require_snapshot } => {
                if require_snapshot {
                    let variables = exec_task.variables();
                    let current_step = exec_task.current_step();
                    let total_steps = exec_task.total_steps();
                    let checksum = checkpoint_checksum(task_id, current_step, total_steps, &variables);
                    let checkpoint = ExecutionCheckpoint {
                        id: Uuid::new_v4(),
                        task_id,
                        current_step,
                        total_steps,
                        variables,
                        source_node_id: node_id,
                        created_at: Utc::now(),
                        checksum: Some(checksum),
                    };
                    let _ = out_tx.send(Envelope::new(EventKind::CheckpointSaved, checkpoint));
                }
            }
        }
        // Either way the task is no longer occupying this worker.
        let _ = done_tx.send(task_id);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_worker_accepts_assignment() {
        let incoming = Uuid::new_v4();
        assert!(busy_rejection(None, incoming).is_none());
    }

    #[test]
    fn busy_worker_rejects_second_assignment() {
        let running = Uuid::new_v4();
        let incoming = Uuid::new_v4();
        let report = busy_rejection(Some(running), incoming).expect("should reject while busy");
        assert_eq!(report.task_id, incoming);
        assert!(report.message.contains(&running.to_string()));
    }
}
