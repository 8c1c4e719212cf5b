//! In-memory code registry: bundle storage (by id and by name alias) plus
//! per-task checkpoint history, backed by an `RwLock`-guarded `FxHashMap`
//! with one "latest" pointer per key.

use chrono::Utc;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::checkpoint::{bundle_checksum, verify_checkpoint};
use crate::model::{BundleId, CodeBundle, ExecutionCheckpoint, TaskId};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("bundle not found: {0}")]
    BundleNotFound(String),
    #[error("bundle checksum mismatch for {0}: corruption detected")]
    ChecksumMismatch(String),
    #[error("checkpoint for task {task_id} is not monotonic: step {step} < latest {latest}")]
    NonMonotonicStep { task_id: TaskId, step: u64, latest: u64 },
}

#[derive(Debug, Default)]
pub struct RegistryStats {
    pub total_bundles: usize,
    pub total_checkpoints: usize,
    pub approx_storage_bytes: usize,
}

pub struct CodeRegistry {
    bundles_by_id: RwLock<FxHashMap<BundleId, CodeBundle>>,
    name_to_id: RwLock<FxHashMap<String, BundleId>>,
    checkpoints: RwLock<FxHashMap<TaskId, Vec<ExecutionCheckpoint>>>,
}

impl CodeRegistry {
    pub fn new() -> Self {
        Self {
            bundles_by_id: RwLock::new(FxHashMap::default()),
            name_to_id: RwLock::new(FxHashMap::default()),
            checkpoints: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn register_bundle(
        &self,
        name: impl Into<String>,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> CodeBundle {
        let name = name.into();
        let code = code.into();
        let bundle = CodeBundle {
            id: Uuid::new_v4(),
            name: name.clone(),
            description: description.into(),
            code: code.clone(),
            version: 1,
            checksum: bundle_checksum(&code),
            created_at: Utc::now(),
        };
        self.bundles_by_id.write().insert(bundle.id, bundle.clone());
        self.name_to_id.write().insert(name, bundle.id);
        bundle
    }

    /// Wrap ad-hoc submitter-supplied code as an ephemeral, unnamed bundle.
    /// It is never registered under a name alias.
    pub fn ephemeral_bundle(&self, code: impl Into<String>) -> CodeBundle {
        let code = code.into();
        let bundle = CodeBundle {
            id: Uuid::new_v4(),
            name: format!("ephemeral-{}", Uuid::new_v4()),
            description: "ad-hoc submitted code".to_string(),
            code: code.clone(),
            version: 1,
            checksum: bundle_checksum(&code),
            created_at: Utc::now(),
        };
        self.bundles_by_id.write().insert(bundle.id, bundle.clone());
        bundle
    }

    pub fn get_bundle(&self, id_or_name: &str) -> Result<CodeBundle, RegistryError> {
        if let Ok(id) = Uuid::parse_str(id_or_name) {
            if let Some(bundle) = self.bundles_by_id.read().get(&id).cloned() {
                return self.verified(bundle);
            }
        }
        let id = *self
            .name_to_id
            .read()
            .get(id_or_name)
            .ok_or_else(|| RegistryError::BundleNotFound(id_or_name.to_string()))?;
        let bundle = self
            .bundles_by_id
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RegistryError::BundleNotFound(id_or_name.to_string()))?;
        self.verified(bundle)
    }

    fn verified(&self, bundle: CodeBundle) -> Result<CodeBundle, RegistryError> {
        if bundle_checksum(&bundle.code) == bundle.checksum {
            Ok(bundle)
        } else {
            Err(RegistryError::ChecksumMismatch(bundle.name))
        }
    }

    pub fn verify_bundle(&self, bundle: &CodeBundle) -> bool {
        bundle_checksum(&bundle.code) == bundle.checksum
    }

    /// Append a checkpoint to the task's history. Rejects a checksum that
    /// doesn't validate, and rejects a `current_step` that regresses behind
    /// the task's latest stored checkpoint.
    pub fn save_checkpoint(&self, checkpoint: ExecutionCheckpoint) -> Result<(), RegistryError> {
        if !verify_checkpoint(&checkpoint) {
            return Err(RegistryError::ChecksumMismatch(format!(
                "checkpoint for task {}",
                checkpoint.task_id
            )));
        }
        let mut store = self.checkpoints.write();
        let history = store.entry(checkpoint.task_id).or_default();
        if let Some(latest) = history.last() {
            if checkpoint.current_step < latest.current_step {
                return Err(RegistryError::NonMonotonicStep {
                    task_id: checkpoint.task_id,
                    step: checkpoint.current_step,
                    latest: latest.current_step,
                });
            }
        }
        history.push(checkpoint);
        Ok(())
    }

    pub fn get_latest_checkpoint(&self, task_id: TaskId) -> Option<ExecutionCheckpoint> {
        self.checkpoints
            .read()
            .get(&task_id)
            .and_then(|history| history.last().cloned())
    }

    pub fn checkpoint_history(&self, task_id: TaskId) -> Vec<ExecutionCheckpoint> {
        self.checkpoints.read().get(&task_id).cloned().unwrap_or_default()
    }

    pub fn clear_checkpoints(&self, task_id: TaskId) {
        self.checkpoints.write().remove(&task_id);
    }

    pub fn stats(&self) -> RegistryStats {
        let bundles = self.bundles_by_id.read();
        let checkpoints = self.checkpoints.read();
        let total_checkpoints: usize = checkpoints.values().map(|v| v.len()).sum();
        let approx_storage_bytes = bundles.values().map(|b| b.code.len()).sum::<usize>()
            + checkpoints
                .values()
                .flatten()
                .map(|c| c.variables.len() * 32)
                .sum::<usize>();
        RegistryStats {
            total_bundles: bundles.len(),
            total_checkpoints,
            approx_storage_bytes,
        }
    }
}

impl Default for CodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variables;

    #[test]
    fn register_and_fetch_by_name_and_id() {
        let registry = CodeRegistry::new();
        let bundle = registry.register_bundle("counting", "count to n", "test task");
        assert_eq!(registry.get_bundle("counting").unwrap().id, bundle.id);
        assert_eq!(
            registry.get_bundle(&bundle.id.to_string()).unwrap().name,
            "counting"
        );
    }

    #[test]
    fn tampered_bundle_is_detected() {
        let registry = CodeRegistry::new();
        let mut bundle = registry.register_bundle("counting", "original", "desc");
        bundle.code = "tampered".to_string();
        assert!(!registry.verify_bundle(&bundle));
    }

    #[test]
    fn checkpoint_history_tracks_latest() {
        let registry = CodeRegistry::new();
        let task_id = Uuid::new_v4();
        let node_id = Uuid::new_v4();
        for step in [10u64, 20, 30] {
            let vars = Variables::default();
            let checksum = crate::checkpoint::checkpoint_checksum(task_id, step, 100, &vars);
            registry
                .save_checkpoint(ExecutionCheckpoint {
                    id: Uuid::new_v4(),
                    task_id,
                    current_step: step,
                    total_steps: 100,
                    variables: vars,
                    source_node_id: node_id,
                    created_at: Utc::now(),
                    checksum: Some(checksum),
                })
                .unwrap();
        }
        assert_eq!(registry.get_latest_checkpoint(task_id).unwrap().current_step, 30);
        assert_eq!(registry.checkpoint_history(task_id).len(), 3);
    }

    #[test]
    fn rejects_a_regressing_step() {
        let registry = CodeRegistry::new();
        let task_id = Uuid::new_v4();
        let node_id = Uuid::new_v4();
        let vars = Variables::default();
        for step in [20u64, 10] {
            let checksum = crate::checkpoint::checkpoint_checksum(task_id, step, 100, &vars);
            let result = registry.save_checkpoint(ExecutionCheckpoint {
                id: Uuid::new_v4(),
                task_id,
                current_step: step,
                total_steps: 100,
                variables: vars.clone(),
                source_node_id: node_id,
                created_at: Utc::now(),
                checksum: Some(checksum),
            });
            if step == 10 {
                assert!(result.is_err());
            } else {
                result.unwrap();
            }
        }
        assert_eq!(registry.get_latest_checkpoint(task_id).unwrap().current_step, 20);
    }

    #[test]
    fn rejects_checkpoint_with_bad_checksum() {
        let registry = CodeRegistry::new();
        let task_id = Uuid::new_v4();
        let checkpoint = ExecutionCheckpoint {
            id: Uuid::new_v4(),
            task_id,
            current_step: 1,
            total_steps: 10,
            variables: Variables::default(),
            source_node_id: Uuid::new_v4(),
            created_at: Utc::now(),
            checksum: Some("not-a-real-checksum".to_string()),
        };
        assert!(registry.save_checkpoint(checkpoint).is_err());
    }
}
