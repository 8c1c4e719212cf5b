//! Authoritative node/task tables and the stats history used by the
//! overload detector. Owned exclusively by the actor task in `actor.rs` —
//! nothing outside this module's owner mutates it directly.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::{mpsc, oneshot};

use crate::config::CoordinatorConfig;
use crate::coordinator::error::CoordinatorError;
use crate::event_bus::EventBus;
use crate::model::{ExecutionCheckpoint, Node, NodeId, NodeStatus, Task, TaskId};
use crate::protocol::Envelope;
use crate::registry::CodeRegistry;

/// A trailing CPU sample for the overload detector.
#[derive(Clone, Copy, Debug)]
pub struct CpuSample {
    pub at: DateTime<Utc>,
    pub cpu_usage: f32,
}

pub struct CoordinatorState {
    pub nodes: FxHashMap<NodeId, Node>,
    /// Insertion order, used to make worker selection deterministic.
    pub node_order: Vec<NodeId>,
    pub tasks: FxHashMap<TaskId, Task>,
    /// Tasks currently inside a migration transaction.
    pub migrating: FxHashSet<TaskId>,
    /// One-shot resolver for a task awaiting a fresh checkpoint during
    /// AWAIT_SNAPSHOT. Removed the moment a `checkpoint:saved` for that task
    /// arrives (successfully or not), or when the waiting task times out.
    pub pending_snapshot_waiters:
        FxHashMap<TaskId, oneshot::Sender<Result<ExecutionCheckpoint, CoordinatorError>>>,
    /// The caller's reply channel for an in-flight `RequestMigration`
    /// command, resolved once COMMIT or ABORT is reached.
    pub migration_replies: FxHashMap<TaskId, oneshot::Sender<Result<(), CoordinatorError>>>,
    pub stats_history: FxHashMap<NodeId, VecDeque<CpuSample>>,
    /// Outbound control-channel queue per connected node, wired up by
    /// `server.rs` when a websocket connection is accepted.
    pub node_senders: FxHashMap<NodeId, mpsc::UnboundedSender<Envelope>>,
    pub registry: Arc<CodeRegistry>,
    pub event_bus: Arc<EventBus>,
    pub config: CoordinatorConfig,
}

impl CoordinatorState {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            nodes: FxHashMap::default(),
            node_order: Vec::new(),
            tasks: FxHashMap::default(),
            migrating: FxHashSet::default(),
            pending_snapshot_waiters: FxHashMap::default(),
            migration_replies: FxHashMap::default(),
            stats_history: FxHashMap::default(),
            node_senders: FxHashMap::default(),
            registry: Arc::new(CodeRegistry::new()),
            event_bus: EventBus::new(),
            config,
        }
    }

    pub fn register_node(&mut self, node: Node) {
        if !self.nodes.contains_key(&node.id) {
            self.node_order.push(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    pub fn remove_node(&mut self, node_id: NodeId) {
        self.nodes.remove(&node_id);
        self.node_order.retain(|id| *id != node_id);
        self.stats_history.remove(&node_id);
        self.node_senders.remove(&node_id);
    }

    /// Best-effort send to a node's control channel. Silently drops if the
    /// node isn't connected (disconnected mid-flight, or never was in
    /// non-networked test setups) — the coordinator doesn't block on it.
    pub fn send_to(&self, node_id: NodeId, envelope: Envelope) {
        if let Some(sender) = self.node_senders.get(&node_id) {
            let _ = sender.send(envelope);
        }
    }

    /// Deterministic, insertion-order scan for the first online worker,
    /// optionally excluding a node (used for migration targets).
    pub fn find_available_worker(&self, exclude: Option<NodeId>) -> Option<NodeId> {
        self.node_order.iter().copied().find(|id| {
            Some(*id) != exclude
                && self
                    .nodes
                    .get(id)
                    .map(|n| n.is_available_worker())
                    .unwrap_or(false)
        })
    }

    pub fn tasks_owned_by(&self, node_id: NodeId) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.current_node_id == Some(node_id))
            .map(|t| t.id)
            .collect()
    }

    pub fn record_cpu_sample(&mut self, node_id: NodeId, cpu_usage: f32) {
        let history = self.stats_history.entry(node_id).or_default();
        history.push_back(CpuSample { at: Utc::now(), cpu_usage });
        let cutoff = Utc::now() - chrono::Duration::seconds(30);
        while history.front().is_some_and(|s| s.at < cutoff) {
            history.pop_front();
        }
    }

    pub fn clear_cpu_history(&mut self, node_id: NodeId) {
        self.stats_history.remove(&node_id);
    }

    pub fn set_node_status(&mut self, node_id: NodeId, status: NodeStatus) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.status = status;
        }
    }
}
