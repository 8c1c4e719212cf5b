//! Core data model: nodes, tasks, code bundles, and execution checkpoints.
//!
//! These are plain, serializable records. The coordinator owns the
//! authoritative copies; everything else (workers, tests, the HTTP layer)
//! works with clones or references into the coordinator's tables.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type NodeId = Uuid;
pub type TaskId = Uuid;
pub type BundleId = Uuid;
pub type CheckpointId = Uuid;

/// Opaque, task-defined key-value state carried inside a checkpoint.
pub type Variables = FxHashMap<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Coordinator,
    Worker,
    Registry,
    Monitor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
    Busy,
    Migrating,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub role: NodeRole,
    pub status: NodeStatus,
    pub address: String,
    pub joined_at: DateTime<Utc>,
    pub last_ping: DateTime<Utc>,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, role: NodeRole, address: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            role,
            status: NodeStatus::Online,
            address: address.into(),
            joined_at: now,
            last_ping: now,
        }
    }

    pub fn is_available_worker(&self) -> bool {
        self.role == NodeRole::Worker && self.status == NodeStatus::Online
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Migrating,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationType {
    Weak,
    Strong,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Name of a registered `CodeBundle`, resolved at submission time.
    pub code: String,
    /// Inline code supplied by the submitter instead of a registry lookup.
    pub custom_code: Option<String>,
    pub status: TaskStatus,
    pub migration_type: MigrationType,
    pub current_node_id: Option<NodeId>,
    pub progress: f32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
}

impl Task {
    pub fn new(
        id: TaskId,
        name: impl Into<String>,
        code: impl Into<String>,
        custom_code: Option<String>,
        migration_type: MigrationType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            code: code.into(),
            custom_code,
            status: TaskStatus::Pending,
            migration_type,
            current_node_id: None,
            progress: 0.0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
        }
    }

    pub fn execution_time(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeBundle {
    pub id: BundleId,
    pub name: String,
    pub description: String,
    pub code: String,
    pub version: u32,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionCheckpoint {
    pub id: CheckpointId,
    pub task_id: TaskId,
    pub current_step: u64,
    pub total_steps: u64,
    pub variables: Variables,
    pub source_node_id: NodeId,
    pub created_at: DateTime<Utc>,
    pub checksum: Option<String>,
}
