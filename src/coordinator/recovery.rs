//! Recovery manager: decides what happens to a failed node's tasks. Pure
//! decision logic over `&CoordinatorState` — the actor applies the returned
//! actions (it owns the only `&mut` access and the node-sender map needed to
//! actually push `task:assign` messages out).

use crate::coordinator::state::CoordinatorState;
use crate::model::{ExecutionCheckpoint, MigrationType, NodeId, TaskId};

/// One decision per task that was running or migrating on the failed node.
#[derive(Clone, Debug)]
pub enum RecoveryAction {
    /// Reassign to `target`, optionally resuming from `checkpoint`.
    Reassign {
        task_id: TaskId,
        target: NodeId,
        checkpoint: Option<ExecutionCheckpoint>,
    },
    /// No worker was available; the task is marked failed.
    MarkFailed { task_id: TaskId },
}

/// Compute recovery actions for every task owned by `failed_node_id`.
///
/// `failed_node_id` is always excluded from candidate selection, even if a
/// node with the same id has already re-registered by the time this runs —
/// a task that was running there gets a genuinely different home or nothing.
pub fn recover_node(state: &CoordinatorState, failed_node_id: NodeId) -> Vec<RecoveryAction> {
    let mut actions = Vec::new();
    for task_id in state.tasks_owned_by(failed_node_id) {
        let task = match state.tasks.get(&task_id) {
            Some(t) => t,
            None => continue,
        };
        if !matches!(
            task.status,
            crate::model::TaskStatus::Running | crate::model::TaskStatus::Migrating
        ) {
            continue;
        }

        let Some(target) = state.find_available_worker(Some(failed_node_id)) else {
            actions.push(RecoveryAction::MarkFailed { task_id });
            continue;
        };

        let checkpoint = match task.migration_type {
            MigrationType::Weak => None,
            MigrationType::Strong => state.registry.get_latest_checkpoint(task_id),
        };
        actions.push(RecoveryAction::Reassign {
            task_id,
            target,
            checkpoint,
        });
    }
    actions
}
