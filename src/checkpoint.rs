//! Checksum computation for code bundles and checkpoints.
//!
//! Bundle checksums hash the raw source bytes. Checkpoint checksums hash a
//! canonical, sorted-key JSON encoding of `{taskId, currentStep, totalSteps,
//! variables}` — the fields that must round-trip identically for the
//! coordinator to trust a `checkpoint:saved` payload.

use serde_json::{Map, Value};

use crate::model::{ExecutionCheckpoint, TaskId, Variables};

/// Recursively sort object keys so the same logical value always serializes
/// to the same bytes, independent of map iteration order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

pub fn checkpoint_checksum(
    task_id: TaskId,
    current_step: u64,
    total_steps: u64,
    variables: &Variables,
) -> String {
    let variables_value: Value = serde_json::to_value(variables).unwrap_or(Value::Null);
    let payload = serde_json::json!({
        "taskId": task_id,
        "currentStep": current_step,
        "totalSteps": total_steps,
        "variables": canonicalize(&variables_value),
    });
    let canonical = canonicalize(&payload);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

pub fn bundle_checksum(code: &str) -> String {
    blake3::hash(code.as_bytes()).to_hex().to_string()
}

/// Verify that a checkpoint's declared checksum (if any) matches its content.
/// A checkpoint with no declared checksum is treated as unverifiable and
/// rejected by the migration path (the coordinator never trusts an
/// unchecksummed strong-migration snapshot).
pub fn verify_checkpoint(checkpoint: &ExecutionCheckpoint) -> bool {
    match &checkpoint.checksum {
        Some(declared) => {
            let expected = checkpoint_checksum(
                checkpoint.task_id,
                checkpoint.current_step,
                checkpoint.total_steps,
                &checkpoint.variables,
            );
            &expected == declared
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn checksum_is_stable_under_key_reordering() {
        let task_id = Uuid::new_v4();
        let mut a = Variables::default();
        a.insert("x".into(), serde_json::json!(1));
        a.insert("y".into(), serde_json::json!(2));

        let mut b = Variables::default();
        b.insert("y".into(), serde_json::json!(2));
        b.insert("x".into(), serde_json::json!(1));

        assert_eq!(
            checkpoint_checksum(task_id, 5, 10, &a),
            checkpoint_checksum(task_id, 5, 10, &b)
        );
    }

    #[test]
    fn checksum_changes_with_content() {
        let task_id = Uuid::new_v4();
        let vars = Variables::default();
        let c1 = checkpoint_checksum(task_id, 5, 10, &vars);
        let c2 = checkpoint_checksum(task_id, 6, 10, &vars);
        assert_ne!(c1, c2);
    }

    #[test]
    fn verify_detects_tampering() {
        let task_id = Uuid::new_v4();
        let mut vars = Variables::default();
        vars.insert("count".into(), serde_json::json!(5));
        let checksum = checkpoint_checksum(task_id, 5, 100, &vars);

        let mut checkpoint = ExecutionCheckpoint {
            id: Uuid::new_v4(),
            task_id,
            current_step: 5,
            total_steps: 100,
            variables: vars,
            source_node_id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            checksum: Some(checksum),
        };
        assert!(verify_checkpoint(&checkpoint));

        checkpoint
            .variables
            .insert("count".into(), serde_json::json!(999));
        assert!(!verify_checkpoint(&checkpoint));
    }
}
