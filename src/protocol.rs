//! Wire-level protocol: the closed event vocabulary and message envelope
//! exchanged over the control channel between coordinator and nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{CodeBundle, ExecutionCheckpoint, MigrationType, Node, NodeId, Task, TaskId};

/// The bit-stable closed set of control-channel event names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "connect")]
    Connect,
    #[serde(rename = "disconnect")]
    Disconnect,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "node:register")]
    NodeRegister,
    #[serde(rename = "node:registered")]
    NodeRegistered,
    #[serde(rename = "node:heartbeat")]
    NodeHeartbeat,
    #[serde(rename = "node:status:update")]
    NodeStatusUpdate,
    #[serde(rename = "node:list:update")]
    NodeListUpdate,
    #[serde(rename = "task:submit")]
    TaskSubmit,
    #[serde(rename = "task:submitted")]
    TaskSubmitted,
    #[serde(rename = "task:assign")]
    TaskAssign,
    #[serde(rename = "task:start")]
    TaskStart,
    #[serde(rename = "task:progress")]
    TaskProgress,
    #[serde(rename = "task:complete")]
    TaskComplete,
    #[serde(rename = "task:pause")]
    TaskPause,
    #[serde(rename = "task:error")]
    TaskError,
    #[serde(rename = "migration:request")]
    MigrationRequest,
    #[serde(rename = "migration:prepare")]
    MigrationPrepare,
    #[serde(rename = "migration:ready")]
    MigrationReady,
    #[serde(rename = "migration:execute")]
    MigrationExecute,
    #[serde(rename = "migration:complete")]
    MigrationComplete,
    #[serde(rename = "migration:failed")]
    MigrationFailed,
    #[serde(rename = "checkpoint:save")]
    CheckpointSave,
    #[serde(rename = "checkpoint:saved")]
    CheckpointSaved,
    #[serde(rename = "checkpoint:load")]
    CheckpointLoad,
    #[serde(rename = "checkpoint:loaded")]
    CheckpointLoaded,
    #[serde(rename = "broadcast:event")]
    BroadcastEvent,
    #[serde(rename = "system:update")]
    SystemUpdate,
    #[serde(rename = "log:message")]
    LogMessage,
    #[serde(rename = "node:stats")]
    NodeStats,
}

/// A control-channel message: `{event, payload}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub event: EventKind,
    pub payload: Value,
}

impl Envelope {
    pub fn new(event: EventKind, payload: impl Serialize) -> Self {
        Self {
            event,
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }
}

/// Migration type carried on `broadcast:event`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MigrationEvent {
    MigrationRequested {
        task_id: TaskId,
        source: NodeId,
        target: NodeId,
        migration_type: MigrationType,
    },
    MigrationStarted {
        task_id: TaskId,
    },
    CheckpointSaved {
        task_id: TaskId,
        current_step: u64,
    },
    CodeTransferred {
        task_id: TaskId,
        target: NodeId,
    },
    StateTransferred {
        task_id: TaskId,
        target: NodeId,
    },
    MigrationCompleted {
        task_id: TaskId,
        target: NodeId,
    },
    MigrationFailed {
        task_id: TaskId,
        reason: String,
    },
    ExecutionResumed {
        task_id: TaskId,
        at_step: u64,
    },
    NodeFailureDetected {
        node_id: NodeId,
    },
    TaskRecovered {
        task_id: TaskId,
        target: NodeId,
    },
}

/// Payload for `task:assign`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task: Task,
    pub code_bundle: CodeBundle,
    pub checkpoint: Option<ExecutionCheckpoint>,
}

/// Payload for `task:pause`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PauseRequest {
    pub task_id: TaskId,
    pub require_snapshot: bool,
}

/// Payload for `node:stats`, bundled alongside heartbeats.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NodeStats {
    pub node_id: NodeId,
    pub cpu_usage: f32,
    pub memory_usage: f32,
}

/// Inbound payload for `node:register`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRegistration {
    pub name: String,
    pub role: crate::model::NodeRole,
    pub address: String,
}

/// Inbound payload for `task:submit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub name: String,
    pub code: String,
    pub custom_code: Option<String>,
    pub migration_type: MigrationType,
}

/// Inbound payload for `migration:request`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MigrationRequestPayload {
    pub task_id: TaskId,
    pub source_node_id: NodeId,
    pub target_node_id: NodeId,
    pub migration_type: MigrationType,
}

/// Inbound payload for `task:progress` reports from a worker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TaskProgressReport {
    pub task_id: TaskId,
    pub current_step: u64,
    pub total_steps: u64,
}

/// Inbound payload for `task:complete`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskCompleteReport {
    pub task_id: TaskId,
    pub result: Value,
}

/// Inbound payload for `task:error` reports from a worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskErrorReport {
    pub task_id: TaskId,
    pub message: String,
}

/// Payload for `checkpoint:save`, asking the node currently running `task_id`
/// to emit a fresh checkpoint without pausing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CheckpointSaveRequest {
    pub task_id: TaskId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_wire_strings_are_stable() {
        let json = serde_json::to_string(&EventKind::NodeStatusUpdate).unwrap();
        assert_eq!(json, "\"node:status:update\"");
        let round_trip: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(round_trip, EventKind::NodeStatusUpdate);
    }

    #[test]
    fn envelope_round_trips() {
        let env = Envelope::new(EventKind::NodeHeartbeat, serde_json::json!({"nodeId": "abc"}));
        let text = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back.event, EventKind::NodeHeartbeat);
        assert_eq!(back.payload["nodeId"], "abc");
    }
}
