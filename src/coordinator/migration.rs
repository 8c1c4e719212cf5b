//! Migration transaction validation. The actual PREPARE → AWAIT_SNAPSHOT →
//! COMMIT → DONE state machine is orchestrated in `actor.rs` (it needs the
//! actor's own command channel to model the AWAIT_SNAPSHOT suspension
//! point); this module holds the pure pieces: the request shape and the
//! PREPARE-phase validation.

use crate::coordinator::error::CoordinatorError;
use crate::coordinator::state::CoordinatorState;
use crate::model::{MigrationType, NodeId, TaskId, TaskStatus};

#[derive(Clone, Copy, Debug)]
pub struct MigrationRequest {
    pub task_id: TaskId,
    pub source_node_id: NodeId,
    pub target_node_id: NodeId,
    pub migration_type: MigrationType,
}

/// PREPARE-phase validation: task exists, source currently owns it, source
/// and target are distinct and online, and no other migration is already
/// outstanding for the task. Bundle resolvability is checked by the caller
/// once it has the task's code name in hand (this function only validates
/// the node/task shape of the request).
pub fn validate_prepare(
    state: &CoordinatorState,
    req: &MigrationRequest,
) -> Result<(), CoordinatorError> {
    if state.migrating.contains(&req.task_id) {
        return Err(CoordinatorError::MigrationInProgress(req.task_id));
    }

    let task = state
        .tasks
        .get(&req.task_id)
        .ok_or(CoordinatorError::TaskNotFound(req.task_id))?;

    if task.current_node_id != Some(req.source_node_id) || task.status != TaskStatus::Running {
        return Err(CoordinatorError::SourceMismatch {
            task: req.task_id,
            source: req.source_node_id,
        });
    }

    if req.source_node_id == req.target_node_id {
        return Err(CoordinatorError::SameNode);
    }

    let target = state
        .nodes
        .get(&req.target_node_id)
        .ok_or(CoordinatorError::NodeNotFound(req.target_node_id))?;
    if !target.is_available_worker() {
        return Err(CoordinatorError::NodeNotFound(req.target_node_id));
    }

    Ok(())
}
