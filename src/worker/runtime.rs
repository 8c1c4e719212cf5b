//! Execution runtime: the pause/checkpoint/resume contract every built-in
//! task implements, plus the driver loop that runs a task to completion or
//! to a suspension point.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::model::{TaskId, Variables};

/// Signals sent into a running task from the worker's control loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Pause { require_snapshot: bool },
}

/// What a single execution step produced.
pub enum StepOutcome {
    Continue,
    Done(Value),
    Paused,
}

/// A resumable unit of work. Built-in tasks implement this directly;
/// submitter-provided inline code is wrapped by [`crate::worker::tasks`]
/// before being driven the same way.
#[async_trait]
pub trait ExecutableTask: Send {
    /// Total step count, used for progress reporting and checkpoint
    /// canonicalization.
    fn total_steps(&self) -> u64;

    /// Restore state from a checkpoint before execution begins (no-op for a
    /// fresh, non-migrated run).
    fn resume_from(&mut self, current_step: u64, variables: &Variables);

    /// Run exactly one step. Returning `StepOutcome::Paused` suspends
    /// execution at the current step; the driver snapshots `variables()`
    /// into a checkpoint for the caller to persist.
    async fn step(&mut self) -> StepOutcome;

    fn current_step(&self) -> u64;

    /// Opaque task-defined state carried into a checkpoint.
    fn variables(&self) -> Variables;
}

/// Drives `task` step by step, reporting progress through `on_progress` and
/// stopping either on completion or when `control` carries a `Pause` signal.
pub struct ExecutionContext {
    pub task_id: TaskId,
}

impl ExecutionContext {
    pub fn new(task_id: TaskId) -> Self {
        Self { task_id }
    }

    /// Drives `task` to completion or suspension. `snapshot_requests` carries
    /// an off-cycle `checkpoint:save` counter: each time it changes, the task
    /// is asked for its current variables and `on_snapshot` is called without
    /// interrupting the run (unlike `Pause`, this does not suspend).
    ///
    /// `checkpoint_interval_steps` is the periodic checkpointing cadence
    /// (§4.5's `shouldCheckpoint`/`intervalSteps`): `None` disables it
    /// outright (weak tasks never checkpoint); `Some(n)` emits a checkpoint
    /// and resets the steps-since-last-checkpoint counter every `n` steps of
    /// progress. A task that never reaches a multiple of `n` steps before
    /// being asked to pause degrades to weak behavior on migration — this is
    /// the expected, testable failure mode §4.5 describes.
    pub async fn run<F, S>(
        &self,
        task: &mut dyn ExecutableTask,
        control: &mut watch::Receiver<ControlSignal>,
        snapshot_requests: &mut watch::Receiver<u64>,
        checkpoint_interval_steps: Option<u64>,
        mut on_progress: F,
        mut on_snapshot: S,
    ) -> RunOutcome
    where
        F: FnMut(u64, u64) + Send,
        S: FnMut(u64, u64, Variables) + Send,
    {
        let mut last_snapshot_request = *snapshot_requests.borrow();
        let mut steps_since_checkpoint = 0u64;
        loop {
            if let ControlSignal::Pause { require_snapshot } = *control.borrow() {
                return RunOutcome::Paused { require_snapshot };
            }
            let requested = *snapshot_requests.borrow();
            if requested != last_snapshot_request {
                last_snapshot_request = requested;
                on_snapshot(task.current_step(), task.total_steps(), task.variables());
                steps_since_checkpoint = 0;
            }
            match task.step().await {
                StepOutcome::Continue => {
                    on_progress(task.current_step(), task.total_steps());
                    steps_since_checkpoint += 1;
                    if let Some(interval) = checkpoint_interval_steps {
                        if interval > 0 && steps_since_checkpoint >= interval {
                            on_snapshot(task.current_step(), task.total_steps(), task.variables());
                            steps_since_checkpoint = 0;
                        }
                    }
                }
                StepOutcome::Done(result) => return RunOutcome::Completed(result),
                StepOutcome::Paused => {
                    let require_snapshot =
                        matches!(*control.borrow(), ControlSignal::Pause { require_snapshot: true });
                    return RunOutcome::Paused { require_snapshot };
                }
            }
        }
    }
}

pub enum RunOutcome {
    Completed(Value),
    Paused { require_snapshot: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::tasks::CountingTask;
    use uuid::Uuid;

    #[tokio::test]
    async fn periodic_checkpoint_fires_every_interval() {
        let ctx = ExecutionContext::new(Uuid::new_v4());
        let (_control_tx, mut control_rx) = watch::channel(ControlSignal::Run);
        let (_snapshot_tx, mut snapshot_rx) = watch::channel(0u64);
        let mut task: Box<dyn ExecutableTask> = Box::new(CountingTask::new(10));
        let mut checkpoints_at = Vec::new();

        let outcome = ctx
            .run(
                &mut *task,
                &mut control_rx,
                &mut snapshot_rx,
                Some(3),
                |_, _| {},
                |current_step, _total, _vars| checkpoints_at.push(current_step),
            )
            .await;

        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert_eq!(checkpoints_at, vec![3, 6, 9]);
    }

    #[tokio::test]
    async fn disabled_interval_never_checkpoints() {
        let ctx = ExecutionContext::new(Uuid::new_v4());
        let (_control_tx, mut control_rx) = watch::channel(ControlSignal::Run);
        let (_snapshot_tx, mut snapshot_rx) = watch::channel(0u64);
        let mut task: Box<dyn ExecutableTask> = Box::new(CountingTask::new(5));
        let mut checkpoint_count = 0;

        ctx.run(&mut *task, &mut control_rx, &mut snapshot_rx, None, |_, _| {}, |_, _, _| {
            checkpoint_count += 1;
        })
        .await;

        assert_eq!(checkpoint_count, 0);
    }
}
