//! Built-in task library. A code bundle's `name` selects one of these by
//! convention; there is no dynamic code evaluation (see DESIGN.md) — a
//! bundle's `code` field is a recipe parameter, not source text to `eval`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};

use crate::model::Variables;
use crate::worker::error::WorkerError;
use crate::worker::runtime::{ExecutableTask, StepOutcome};

const STEP_DELAY: Duration = Duration::from_millis(50);

/// Counts from 0 up to `target`, one unit per step.
pub struct CountingTask {
    target: u64,
    current: u64,
}

impl CountingTask {
    pub fn new(target: u64) -> Self {
        Self { target, current: 0 }
    }
}

#[async_trait]
impl ExecutableTask for CountingTask {
    fn total_steps(&self) -> u64 {
        self.target
    }

    fn resume_from(&mut self, current_step: u64, variables: &Variables) {
        self.current = variables
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(current_step);
    }

    async fn step(&mut self) -> StepOutcome {
        if self.current >= self.target {
            return StepOutcome::Done(json!({ "count": self.current }));
        }
        sleep(STEP_DELAY).await;
        self.current += 1;
        StepOutcome::Continue
    }

    fn current_step(&self) -> u64 {
        self.current
    }

    fn variables(&self) -> Variables {
        let mut vars = Variables::default();
        vars.insert("count".to_string(), json!(self.current));
        vars
    }
}

/// Computes the `target`-th Fibonacci number, one term per step.
pub struct FibonacciTask {
    target: u64,
    current: u64,
    a: u64,
    b: u64,
}

impl FibonacciTask {
    pub fn new(target: u64) -> Self {
        Self { target, current: 0, a: 0, b: 1 }
    }
}

#[async_trait]
impl ExecutableTask for FibonacciTask {
    fn total_steps(&self) -> u64 {
        self.target
    }

    fn resume_from(&mut self, current_step: u64, variables: &Variables) {
        self.current = current_step;
        self.a = variables.get("a").and_then(Value::as_u64).unwrap_or(0);
        self.b = variables.get("b").and_then(Value::as_u64).unwrap_or(1);
    }

    async fn step(&mut self) -> StepOutcome {
        if self.current >= self.target {
            return StepOutcome::Done(json!({ "value": self.a }));
        }
        sleep(STEP_DELAY).await;
        let next = self.a.saturating_add(self.b);
        self.a = self.b;
        self.b = next;
        self.current += 1;
        StepOutcome::Continue
    }

    fn current_step(&self) -> u64 {
        self.current
    }

    fn variables(&self) -> Variables {
        let mut vars = Variables::default();
        vars.insert("a".to_string(), json!(self.a));
        vars.insert("b".to_string(), json!(self.b));
        vars
    }
}

/// Resolves a code bundle's `name` to a fresh, runnable task instance.
/// `total_steps` comes from the bundle's `code` field, parsed as the task's
/// numeric target (e.g. count-to-N or fib-term-N).
pub fn build(name: &str, code: &str) -> Result<Box<dyn ExecutableTask>, WorkerError> {
    let target: u64 = code.trim().parse().unwrap_or(20);
    match name {
        "counting" => Ok(Box::new(CountingTask::new(target))),
        "fibonacci" => Ok(Box::new(FibonacciTask::new(target))),
        other => Err(WorkerError::UnknownCode(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counting_task_reaches_target() {
        let mut task = CountingTask::new(3);
        loop {
            match task.step().await {
                StepOutcome::Continue => {}
                StepOutcome::Done(result) => {
                    assert_eq!(result["count"], 3);
                    break;
                }
                StepOutcome::Paused => unreachable!(),
            }
        }
    }

    #[tokio::test]
    async fn fibonacci_resumes_from_checkpoint() {
        let mut task = FibonacciTask::new(6);
        for _ in 0..3 {
            task.step().await;
        }
        let vars = task.variables();
        let mut resumed = FibonacciTask::new(6);
        resumed.resume_from(task.current_step(), &vars);
        while !matches!(resumed.step().await, StepOutcome::Done(_)) {}
        assert_eq!(resumed.current, 6);
    }
}
