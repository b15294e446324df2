//! Step execution capability
//!
//! A `StepExecutor` produces the artifact content for one pipeline step. The
//! engine owns ordering, persistence and state transitions; the executor owns
//! nothing but the work itself, so agent/model specifics stay out of the core.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crucible_core::domain::definition::StepKind;

/// Everything an executor may need about the step it is running.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub run_id: Uuid,
    pub task_id: Uuid,
    pub tenant_id: String,
    pub ordinal: i32,
    pub name: String,
    pub kind: StepKind,
}

/// Output of a successful step execution.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub content: serde_json::Value,
}

/// A step execution failure.
///
/// Caught at the run-orchestration level and converted into a `failed` run
/// plus skipped remainder; never propagates as an engine error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StepFailure {
    pub message: String,
}

impl StepFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Capability interface for executing one pipeline step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, StepFailure>;
}

/// Deterministic executor for tests and local wiring.
///
/// Produces a fixed JSON document per step and can be programmed to fail at
/// specific ordinals.
#[derive(Debug, Default)]
pub struct MockStepExecutor {
    fail_at: Mutex<HashSet<i32>>,
}

impl MockStepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes execution fail for the given 1-based ordinal.
    pub fn failing_at(self, ordinal: i32) -> Self {
        self.fail_at.lock().unwrap().insert(ordinal);
        self
    }
}

#[async_trait]
impl StepExecutor for MockStepExecutor {
    async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, StepFailure> {
        if self.fail_at.lock().unwrap().contains(&ctx.ordinal) {
            return Err(StepFailure::new(format!(
                "step '{}' (ordinal {}) failed",
                ctx.name, ctx.ordinal
            )));
        }

        Ok(StepOutput {
            content: json!({
                "step": ctx.name,
                "kind": ctx.kind.as_str(),
                "ordinal": ctx.ordinal,
                "summary": format!("mock output for '{}'", ctx.name),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(ordinal: i32) -> StepContext {
        StepContext {
            run_id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            tenant_id: "tenant-a".to_string(),
            ordinal,
            name: format!("step-{}", ordinal),
            kind: StepKind::Analysis,
        }
    }

    #[tokio::test]
    async fn test_mock_executor_succeeds_by_default() {
        let executor = MockStepExecutor::new();
        let output = executor.execute(&ctx(1)).await.unwrap();
        assert_eq!(output.content["ordinal"], 1);
        assert_eq!(output.content["kind"], "analysis");
    }

    #[tokio::test]
    async fn test_mock_executor_fails_at_programmed_ordinal() {
        let executor = MockStepExecutor::new().failing_at(2);
        assert!(executor.execute(&ctx(1)).await.is_ok());

        let failure = executor.execute(&ctx(2)).await.unwrap_err();
        assert!(failure.message.contains("ordinal 2"));
    }
}
