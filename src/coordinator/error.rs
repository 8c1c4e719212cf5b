use miette::Diagnostic;
use thiserror::Error;

use crate::model::{NodeId, TaskId};

/// Failure taxonomy for coordinator operations: one variant per error class
/// (availability, transaction, integrity, connectivity).
#[derive(Debug, Error, Diagnostic)]
pub enum CoordinatorError {
    #[error("no worker available for task {0}")]
    #[diagnostic(
        code(workmesh::coordinator::no_worker),
        help("The task stays pending and will be picked up by the next sweep once a worker registers.")
    )]
    NoWorkerAvailable(TaskId),

    #[error("task not found: {0}")]
    #[diagnostic(code(workmesh::coordinator::task_not_found))]
    TaskNotFound(TaskId),

    #[error("node not found: {0}")]
    #[diagnostic(code(workmesh::coordinator::node_not_found))]
    NodeNotFound(NodeId),

    #[error("bundle resolution failed: {0}")]
    #[diagnostic(code(workmesh::coordinator::bundle))]
    BundleError(#[from] crate::registry::RegistryError),

    #[error("task {0} is already migrating")]
    #[diagnostic(
        code(workmesh::coordinator::migration_in_progress),
        help("Only one migration transaction may be outstanding per task.")
    )]
    MigrationInProgress(TaskId),

    #[error("source node {source} does not own task {task}")]
    #[diagnostic(code(workmesh::coordinator::source_mismatch))]
    SourceMismatch { task: TaskId, source: NodeId },

    #[error("source and target node must differ")]
    #[diagnostic(code(workmesh::coordinator::same_node))]
    SameNode,

    #[error("snapshot wait timed out for task {0}")]
    #[diagnostic(
        code(workmesh::coordinator::snapshot_timeout),
        help("The source never emitted a fresh checkpoint within the snapshot window.")
    )]
    SnapshotTimeout(TaskId),

    #[error("checkpoint checksum mismatch for task {0}")]
    #[diagnostic(code(workmesh::coordinator::checksum_mismatch))]
    ChecksumMismatch(TaskId),
}
