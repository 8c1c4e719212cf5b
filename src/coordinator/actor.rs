//! The coordinator actor: a single task that owns `CoordinatorState` and
//! processes one `Command` at a time from an mpsc channel. Every external
//! entry point — the HTTP/websocket layer in `server.rs`, tests, the
//! heartbeat-timeout ticker — talks to it only through `CoordinatorHandle`.
//! Single-writer discipline: no lock contention, no torn reads, one place
//! that can answer "what happened and in what order."

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::config::CoordinatorConfig;
use crate::coordinator::error::CoordinatorError;
use crate::coordinator::migration::{self, MigrationRequest};
use crate::coordinator::recovery::{self, RecoveryAction};
use crate::coordinator::{autoscale, state::CoordinatorState};
use crate::model::{
    CodeBundle, ExecutionCheckpoint, MigrationType, Node, NodeId, NodeRole, NodeStatus, Task,
    TaskId, TaskStatus,
};
use crate::protocol::{
    CheckpointSaveRequest, Envelope, EventKind, MigrationEvent, PauseRequest, TaskAssignment,
};

const COMMAND_CHANNEL_CAPACITY: usize = 512;

#[derive(Clone, Debug)]
pub struct SystemSnapshot {
    pub nodes: Vec<Node>,
    pub tasks: Vec<Task>,
}

enum Command {
    RegisterNode {
        name: String,
        role: NodeRole,
        address: String,
        reply: oneshot::Sender<NodeId>,
    },
    ConnectSender {
        node_id: NodeId,
        sender: mpsc::UnboundedSender<Envelope>,
    },
    Heartbeat {
        node_id: NodeId,
    },
    StatusUpdate {
        node_id: NodeId,
        status: NodeStatus,
    },
    Disconnect {
        node_id: NodeId,
    },
    SubmitTask {
        name: String,
        code: String,
        custom_code: Option<String>,
        migration_type: MigrationType,
        reply: oneshot::Sender<Result<TaskId, CoordinatorError>>,
    },
    TaskProgress {
        task_id: TaskId,
        current_step: u64,
        total_steps: u64,
    },
    TaskComplete {
        task_id: TaskId,
        result: Value,
    },
    TaskFailed {
        task_id: TaskId,
        message: String,
    },
    RequestMigration {
        task_id: TaskId,
        source_node_id: NodeId,
        target_node_id: NodeId,
        migration_type: MigrationType,
        reply: oneshot::Sender<Result<(), CoordinatorError>>,
    },
    CheckpointSaved {
        checkpoint: ExecutionCheckpoint,
    },
    /// Sent by the AWAIT_SNAPSHOT watcher task once the snapshot wait
    /// resolves, times out, or the checksum fails validation.
    MigrationResume {
        task_id: TaskId,
        target: NodeId,
        result: Result<ExecutionCheckpoint, CoordinatorError>,
    },
    NodeStatsSample {
        node_id: NodeId,
        cpu_usage: f32,
        memory_usage: f32,
    },
    Sweep,
    Snapshot {
        reply: oneshot::Sender<SystemSnapshot>,
    },
    RegisterBundle {
        name: String,
        code: String,
        description: String,
        reply: oneshot::Sender<CodeBundle>,
    },
    RequestCheckpoint {
        task_id: TaskId,
    },
    RegistryStats {
        reply: oneshot::Sender<crate::registry::RegistryStats>,
    },
}

#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub fn spawn(config: CoordinatorConfig) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let state = CoordinatorState::new(config.clone());
        let self_tx = tx.clone();
        tokio::spawn(run(state, rx, self_tx));

        let ticker_tx = tx.clone();
        let interval = config.check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if ticker_tx.send(Command::Sweep).await.is_err() {
                    break;
                }
            }
        });

        Self { tx }
    }

    #[tracing::instrument(skip(self))]
    pub async fn register_node(
        &self,
        name: impl Into<String> + std::fmt::Debug,
        role: NodeRole,
        address: impl Into<String> + std::fmt::Debug,
    ) -> NodeId {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::RegisterNode {
                name: name.into(),
                role,
                address: address.into(),
                reply,
            })
            .await;
        rx.await.expect("coordinator actor dropped reply sender")
    }

    pub async fn connect_sender(&self, node_id: NodeId, sender: mpsc::UnboundedSender<Envelope>) {
        let _ = self.tx.send(Command::ConnectSender { node_id, sender }).await;
    }

    pub async fn heartbeat(&self, node_id: NodeId) {
        let _ = self.tx.send(Command::Heartbeat { node_id }).await;
    }

    pub async fn status_update(&self, node_id: NodeId, status: NodeStatus) {
        let _ = self.tx.send(Command::StatusUpdate { node_id, status }).await;
    }

    pub async fn disconnect(&self, node_id: NodeId) {
        let _ = self.tx.send(Command::Disconnect { node_id }).await;
    }

    #[tracing::instrument(skip(self, custom_code))]
    pub async fn submit_task(
        &self,
        name: impl Into<String> + std::fmt::Debug,
        code: impl Into<String> + std::fmt::Debug,
        custom_code: Option<String>,
        migration_type: MigrationType,
    ) -> Result<TaskId, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::SubmitTask {
                name: name.into(),
                code: code.into(),
                custom_code,
                migration_type,
                reply,
            })
            .await;
        rx.await.expect("coordinator actor dropped reply sender")
    }

    pub async fn task_progress(&self, task_id: TaskId, current_step: u64, total_steps: u64) {
        let _ = self
            .tx
            .send(Command::TaskProgress { task_id, current_step, total_steps })
            .await;
    }

    pub async fn task_complete(&self, task_id: TaskId, result: Value) {
        let _ = self.tx.send(Command::TaskComplete { task_id, result }).await;
    }

    pub async fn task_failed(&self, task_id: TaskId, message: impl Into<String>) {
        let _ = self
            .tx
            .send(Command::TaskFailed { task_id, message: message.into() })
            .await;
    }

    #[tracing::instrument(skip(self))]
    pub async fn request_migration(
        &self,
        task_id: TaskId,
        source_node_id: NodeId,
        target_node_id: NodeId,
        migration_type: MigrationType,
    ) -> Result<(), CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::RequestMigration {
                task_id,
                source_node_id,
                target_node_id,
                migration_type,
                reply,
            })
            .await;
        rx.await.expect("coordinator actor dropped reply sender")
    }

    pub async fn checkpoint_saved(&self, checkpoint: ExecutionCheckpoint) {
        let _ = self.tx.send(Command::CheckpointSaved { checkpoint }).await;
    }

    pub async fn node_stats_sample(&self, node_id: NodeId, cpu_usage: f32, memory_usage: f32) {
        let _ = self
            .tx
            .send(Command::NodeStatsSample { node_id, cpu_usage, memory_usage })
            .await;
    }

    pub async fn snapshot(&self) -> SystemSnapshot {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::Snapshot { reply }).await;
        rx.await.expect("coordinator actor dropped reply sender")
    }

    /// Registers a named code bundle in the registry, e.g. one of the
    /// built-in worker task names ("counting", "fibonacci") at startup.
    pub async fn register_bundle(
        &self,
        name: impl Into<String>,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> CodeBundle {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .tx
            .send(Command::RegisterBundle {
                name: name.into(),
                code: code.into(),
                description: description.into(),
                reply,
            })
            .await;
        rx.await.expect("coordinator actor dropped reply sender")
    }

    /// Asks the node currently running `task_id` to emit an off-cycle
    /// checkpoint, independent of any migration transaction (used by the
    /// recovery path to refresh a checkpoint before it is needed).
    pub async fn request_checkpoint(&self, task_id: TaskId) {
        let _ = self.tx.send(Command::RequestCheckpoint { task_id }).await;
    }

    /// Reads the code registry's bundle/checkpoint storage statistics.
    pub async fn registry_stats(&self) -> crate::registry::RegistryStats {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(Command::RegistryStats { reply }).await;
        rx.await.expect("coordinator actor dropped reply sender")
    }
}

async fn run(mut state: CoordinatorState, mut rx: mpsc::Receiver<Command>, self_tx: mpsc::Sender<Command>) {
    while let Some(cmd) = rx.recv().await {
        handle(&mut state, &self_tx, cmd);
    }
}

fn handle(state: &mut CoordinatorState, self_tx: &mpsc::Sender<Command>, cmd: Command) {
    match cmd {
        Command::RegisterNode { name, role, address, reply } => {
            let id = Uuid::new_v4();
            state.register_node(Node::new(id, name, role, address));
            broadcast_node_list(state);
            let _ = reply.send(id);
        }
        Command::ConnectSender { node_id, sender } => {
            state.node_senders.insert(node_id, sender);
        }
        Command::Heartbeat { node_id } => {
            if let Some(node) = state.nodes.get_mut(&node_id) {
                node.last_ping = Utc::now();
                if node.status == NodeStatus::Offline {
                    node.status = NodeStatus::Online;
                }
            }
        }
        Command::StatusUpdate { node_id, status } => {
            state.set_node_status(node_id, status);
            broadcast_node_list(state);
        }
        Command::Disconnect { node_id } => {
            apply_recovery(state, node_id);
            state.remove_node(node_id);
            broadcast_node_list(state);
        }
        Command::SubmitTask { name, code, custom_code, migration_type, reply } => {
            let bundle = if let Some(source) = custom_code {
                state.registry.ephemeral_bundle(source)
            } else {
                match state.registry.get_bundle(&code) {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = reply.send(Err(CoordinatorError::BundleError(e)));
                        return;
                    }
                }
            };
            let task_id = Uuid::new_v4();
            let task = Task::new(task_id, name, bundle.name.clone(), None, migration_type);
            state.tasks.insert(task_id, task);
            match state.find_available_worker(None) {
                Some(worker) => {
                    assign_task(state, task_id, worker);
                    let _ = reply.send(Ok(task_id));
                }
                None => {
                    // Task stays `Pending` in the table (per §7 availability
                    // handling) for the next sweep to pick up; the submitter
                    // still needs to hear that no worker was assigned yet.
                    tracing::warn!(%task_id, "no worker available at submission, task left pending");
                    let _ = reply.send(Err(CoordinatorError::NoWorkerAvailable(task_id)));
                }
            }
        }
        Command::TaskProgress { task_id, current_step, total_steps } => {
            if let Some(task) = state.tasks.get_mut(&task_id) {
                task.progress = current_step as f32 / total_steps.max(1) as f32;
            }
        }
        Command::TaskComplete { task_id, result } => {
            let node_id = state.tasks.get(&task_id).and_then(|t| t.current_node_id);
            if let Some(task) = state.tasks.get_mut(&task_id) {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(Utc::now());
                task.progress = 1.0;
                task.result = Some(result);
            }
            if let Some(node_id) = node_id {
                state.set_node_status(node_id, NodeStatus::Online);
            }
            state.registry.clear_checkpoints(task_id);
        }
        Command::TaskFailed { task_id, message } => {
            tracing::warn!(%task_id, %message, "task reported failure");
            let node_id = state.tasks.get(&task_id).and_then(|t| t.current_node_id);
            if let Some(task) = state.tasks.get_mut(&task_id) {
                task.status = TaskStatus::Failed;
                task.completed_at = Some(Utc::now());
            }
            if let Some(node_id) = node_id {
                state.set_node_status(node_id, NodeStatus::Online);
            }
        }
        Command::RequestMigration { task_id, source_node_id, target_node_id, migration_type, reply } => {
            begin_migration(state, self_tx, task_id, source_node_id, target_node_id, migration_type, Some(reply));
        }
        Command::CheckpointSaved { checkpoint } => {
            let task_id = checkpoint.task_id;
            match state.registry.save_checkpoint(checkpoint.clone()) {
                Ok(()) => {
                    state.event_bus.publish(MigrationEvent::CheckpointSaved {
                        task_id,
                        current_step: checkpoint.current_step,
                    });
                    if let Some(waiter) = state.pending_snapshot_waiters.remove(&task_id) {
                        let _ = waiter.send(Ok(checkpoint));
                    }
                }
                Err(err) => {
                    tracing::warn!(%task_id, %err, "checkpoint rejected, dropping");
                    if let Some(waiter) = state.pending_snapshot_waiters.remove(&task_id) {
                        let _ = waiter.send(Err(CoordinatorError::ChecksumMismatch(task_id)));
                    }
                }
            }
        }
        Command::MigrationResume { task_id, target, result } => {
            let reply = state.migration_replies.remove(&task_id);
            match result {
                Ok(checkpoint) => {
                    commit_migration(state, task_id, target, Some(checkpoint));
                    if let Some(reply) = reply {
                        let _ = reply.send(Ok(()));
                    }
                }
                Err(err) => {
                    abort_migration(state, task_id, &err);
                    if let Some(reply) = reply {
                        let _ = reply.send(Err(err));
                    }
                }
            }
        }
        Command::NodeStatsSample { node_id, cpu_usage, memory_usage: _ } => {
            state.record_cpu_sample(node_id, cpu_usage);
            let threshold = state.config.auto_migration_cpu_threshold;
            let window = state.config.auto_migration_duration;
            let overloaded = state
                .stats_history
                .get(&node_id)
                .map(|history| autoscale::is_overloaded(history, threshold, window))
                .unwrap_or(false);
            if overloaded {
                maybe_trigger_auto_migration(state, self_tx, node_id);
            }
        }
        Command::Sweep => sweep(state),
        Command::Snapshot { reply } => {
            let _ = reply.send(SystemSnapshot {
                nodes: state.nodes.values().cloned().collect(),
                tasks: state.tasks.values().cloned().collect(),
            });
        }
        Command::RegisterBundle { name, code, description, reply } => {
            let bundle = state.registry.register_bundle(name, code, description);
            let _ = reply.send(bundle);
        }
        Command::RequestCheckpoint { task_id } => {
            if let Some(node_id) = state.tasks.get(&task_id).and_then(|t| t.current_node_id) {
                state.send_to(node_id, Envelope::new(EventKind::CheckpointSave, CheckpointSaveRequest { task_id }));
            }
        }
        Command::RegistryStats { reply } => {
            let _ = reply.send(state.registry.stats());
        }
    }
}

fn sweep(state: &mut CoordinatorState) {
    let timeout = state.config.heartbeat_timeout;
    let Ok(timeout_chrono) = chrono::Duration::from_std(timeout) else {
        return;
    };
    let now = Utc::now();
    let stale: Vec<NodeId> = state
        .nodes
        .values()
        .filter(|n| n.role == NodeRole::Worker && n.status != NodeStatus::Offline)
        .filter(|n| now - n.last_ping > timeout_chrono)
        .map(|n| n.id)
        .collect();
    for node_id in stale {
        tracing::warn!(%node_id, "heartbeat timeout, treating node as failed");
        apply_recovery(state, node_id);
        state.set_node_status(node_id, NodeStatus::Offline);
    }

    let pending: Vec<TaskId> = state
        .tasks
        .values()
        .filter(|t| t.status == TaskStatus::Pending)
        .map(|t| t.id)
        .collect();
    for task_id in pending {
        if let Some(worker) = state.find_available_worker(None) {
            assign_task(state, task_id, worker);
        }
    }
}

fn maybe_trigger_auto_migration(state: &mut CoordinatorState, self_tx: &mpsc::Sender<Command>, node_id: NodeId) {
    if state
        .tasks_owned_by(node_id)
        .iter()
        .any(|id| state.migrating.contains(id))
    {
        return;
    }
    let Some(task_id) = state
        .tasks_owned_by(node_id)
        .into_iter()
        .find(|id| state.tasks.get(id).map(|t| t.status == TaskStatus::Running).unwrap_or(false))
    else {
        return;
    };
    let Some(target) = state.find_available_worker(Some(node_id)) else {
        tracing::warn!(%node_id, "cpu overloaded but no migration target available");
        return;
    };
    tracing::info!(%node_id, %target, %task_id, "triggering auto-migration for overloaded node");
    begin_migration(state, self_tx, task_id, node_id, target, MigrationType::Strong, None);
    state.clear_cpu_history(node_id);
}

/// Orchestrates PREPARE through COMMIT/ABORT for both the externally
/// requested path and the auto-migration path (`reply` is `None` there).
fn begin_migration(
    state: &mut CoordinatorState,
    self_tx: &mpsc::Sender<Command>,
    task_id: TaskId,
    source_node_id: NodeId,
    target_node_id: NodeId,
    migration_type: MigrationType,
    reply: Option<oneshot::Sender<Result<(), CoordinatorError>>>,
) {
    let req = MigrationRequest { task_id, source_node_id, target_node_id, migration_type };
    if let Err(e) = migration::validate_prepare(state, &req) {
        if let Some(reply) = reply {
            let _ = reply.send(Err(e));
        }
        return;
    }
    let code_name = state.tasks.get(&task_id).map(|t| t.code.clone()).unwrap_or_default();
    if let Err(e) = state.registry.get_bundle(&code_name) {
        if let Some(reply) = reply {
            let _ = reply.send(Err(CoordinatorError::BundleError(e)));
        }
        return;
    }

    state.migrating.insert(task_id);
    if let Some(task) = state.tasks.get_mut(&task_id) {
        task.status = TaskStatus::Migrating;
    }
    state.event_bus.publish(MigrationEvent::MigrationRequested {
        task_id,
        source: source_node_id,
        target: target_node_id,
        migration_type,
    });
    state.send_to(
        source_node_id,
        Envelope::new(
            EventKind::TaskPause,
            PauseRequest { task_id, require_snapshot: matches!(migration_type, MigrationType::Strong) },
        ),
    );
    state.event_bus.publish(MigrationEvent::MigrationStarted { task_id });

    match migration_type {
        MigrationType::Weak => {
            commit_migration(state, task_id, target_node_id, None);
            if let Some(reply) = reply {
                let _ = reply.send(Ok(()));
            }
        }
        MigrationType::Strong => {
            let (tx, rx) = oneshot::channel();
            state.pending_snapshot_waiters.insert(task_id, tx);
            if let Some(reply) = reply {
                state.migration_replies.insert(task_id, reply);
            }
            let self_tx = self_tx.clone();
            let timeout = state.config.snapshot_timeout;
            tokio::spawn(async move {
                let result = match tokio::time::timeout(timeout, rx).await {
                    Ok(Ok(resolved)) => resolved,
                    _ => Err(CoordinatorError::SnapshotTimeout(task_id)),
                };
                let _ = self_tx
                    .send(Command::MigrationResume { task_id, target: target_node_id, result })
                    .await;
            });
        }
    }
}

fn commit_migration(
    state: &mut CoordinatorState,
    task_id: TaskId,
    target: NodeId,
    checkpoint: Option<ExecutionCheckpoint>,
) {
    state.migrating.remove(&task_id);
    let source = state.tasks.get(&task_id).and_then(|t| t.current_node_id);
    let Some(task) = state.tasks.get(&task_id).cloned() else {
        return;
    };
    let Ok(bundle) = state.registry.get_bundle(&task.code) else {
        tracing::error!(%task_id, "bundle resolution failed at migration commit");
        return;
    };
    if let Some(task) = state.tasks.get_mut(&task_id) {
        task.current_node_id = Some(target);
        task.status = TaskStatus::Running;
        if let Some(checkpoint) = &checkpoint {
            task.progress = checkpoint.current_step as f32 / checkpoint.total_steps.max(1) as f32;
        }
    }
    if let Some(source) = source {
        state.set_node_status(source, NodeStatus::Online);
    }
    state.set_node_status(target, NodeStatus::Busy);

    let assigned = state.tasks.get(&task_id).cloned().unwrap_or(task);
    state.send_to(
        target,
        Envelope::new(
            EventKind::TaskAssign,
            TaskAssignment { task: assigned, code_bundle: bundle, checkpoint: checkpoint.clone() },
        ),
    );
    state.event_bus.publish(MigrationEvent::CodeTransferred { task_id, target });
    if let Some(checkpoint) = &checkpoint {
        state.event_bus.publish(MigrationEvent::StateTransferred { task_id, target });
        state.event_bus.publish(MigrationEvent::ExecutionResumed {
            task_id,
            at_step: checkpoint.current_step,
        });
    }
    state.event_bus.publish(MigrationEvent::MigrationCompleted { task_id, target });
}

fn abort_migration(state: &mut CoordinatorState, task_id: TaskId, err: &CoordinatorError) {
    state.migrating.remove(&task_id);
    state.pending_snapshot_waiters.remove(&task_id);
    if let Some(task) = state.tasks.get_mut(&task_id) {
        let source_reachable = task
            .current_node_id
            .and_then(|id| state.nodes.get(&id))
            .map(|n| n.status != NodeStatus::Offline)
            .unwrap_or(false);
        task.status = if source_reachable { TaskStatus::Running } else { TaskStatus::Failed };
    }
    state.event_bus.publish(MigrationEvent::MigrationFailed { task_id, reason: err.to_string() });
}

fn apply_recovery(state: &mut CoordinatorState, failed_node_id: NodeId) {
    for action in recovery::recover_node(state, failed_node_id) {
        match action {
            RecoveryAction::Reassign { task_id, target, checkpoint } => {
                let Some(task) = state.tasks.get(&task_id).cloned() else { continue };
                let Ok(bundle) = state.registry.get_bundle(&task.code) else { continue };
                if checkpoint.is_none() && task.migration_type == MigrationType::Strong {
                    // §4.4: a strong task with no checkpoint to resume from
                    // degrades to a restart from step 1 instead of failing.
                    tracing::warn!(
                        %task_id,
                        %target,
                        "strong task recovering with no checkpoint available, degrading to restart from step 1"
                    );
                }
                if let Some(task) = state.tasks.get_mut(&task_id) {
                    task.current_node_id = Some(target);
                    task.status = TaskStatus::Running;
                    if checkpoint.is_none() {
                        task.progress = 0.0;
                        task.started_at = Some(Utc::now());
                    }
                }
                state.set_node_status(target, NodeStatus::Busy);
                let assigned = state.tasks.get(&task_id).cloned().unwrap_or(task);
                state.send_to(
                    target,
                    Envelope::new(
                        EventKind::TaskAssign,
                        TaskAssignment { task: assigned, code_bundle: bundle, checkpoint: checkpoint.clone() },
                    ),
                );
                state.event_bus.publish(MigrationEvent::TaskRecovered { task_id, target });
            }
            RecoveryAction::MarkFailed { task_id } => {
                if let Some(task) = state.tasks.get_mut(&task_id) {
                    task.status = TaskStatus::Failed;
                }
                state.event_bus.publish(MigrationEvent::MigrationFailed {
                    task_id,
                    reason: "no worker available for recovery".to_string(),
                });
            }
        }
    }
    state.event_bus.publish(MigrationEvent::NodeFailureDetected { node_id: failed_node_id });
}

fn assign_task(state: &mut CoordinatorState, task_id: TaskId, worker: NodeId) {
    let Some(task) = state.tasks.get(&task_id).cloned() else {
        return;
    };
    let Ok(bundle) = state.registry.get_bundle(&task.code) else {
        tracing::error!(%task_id, "bundle resolution failed at assignment");
        if let Some(task) = state.tasks.get_mut(&task_id) {
            task.status = TaskStatus::Failed;
        }
        return;
    };
    if let Some(task) = state.tasks.get_mut(&task_id) {
        task.current_node_id = Some(worker);
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());
    }
    state.set_node_status(worker, NodeStatus::Busy);
    let assigned = state.tasks.get(&task_id).cloned().unwrap_or(task);
    state.send_to(
        worker,
        Envelope::new(EventKind::TaskAssign, TaskAssignment { task: assigned, code_bundle: bundle, checkpoint: None }),
    );
}

fn broadcast_node_list(state: &CoordinatorState) {
    let nodes: Vec<Node> = state.nodes.values().cloned().collect();
    let envelope = Envelope::new(EventKind::NodeListUpdate, &nodes);
    for sender in state.node_senders.values() {
        let _ = sender.send(envelope.clone());
    }
}
