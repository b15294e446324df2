//! Pipeline run domain types
//!
//! A `PipelineRun` drives a task through an ordered sequence of steps. Its
//! state machine is:
//!
//! ```text
//! created -> validating -> eligible | ineligible
//! eligible -> running -> succeeded | failed
//! any non-terminal -> cancelled
//! ```
//!
//! `created`, `validating` and `eligible` are transient, in-process states;
//! only `running` and the terminal states are ever persisted. Ineligible
//! admission attempts persist no run at all.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Credits;
use crate::domain::definition::{PipelineDefinition, StepKind};

/// One execution of a pipeline for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub task_id: Uuid,
    pub tenant_id: String,
    pub state: RunState,
    pub estimated_cost: Credits,
    pub actual_cost: Credits,
    pub error_detail: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Pipeline run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Created,
    Validating,
    Eligible,
    Ineligible,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Ineligible | RunState::Succeeded | RunState::Failed | RunState::Cancelled
        )
    }

    /// Whether `next` is a legal transition from this state.
    pub fn can_transition_to(self, next: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (RunState::Created, RunState::Validating) => true,
            (RunState::Validating, RunState::Eligible | RunState::Ineligible) => true,
            (RunState::Eligible, RunState::Running) => true,
            (RunState::Running, RunState::Succeeded | RunState::Failed) => true,
            // any non-terminal state may be cancelled
            (_, RunState::Cancelled) => true,
            _ => false,
        }
    }
}

impl PipelineRun {
    /// Creates a run that has passed admission and is about to execute.
    ///
    /// Runs are only ever persisted once eligible, so this is the first
    /// observable state.
    pub fn admitted(task_id: Uuid, tenant_id: impl Into<String>, estimated_cost: Credits) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            tenant_id: tenant_id.into(),
            state: RunState::Running,
            estimated_cost,
            actual_cost: Credits::ZERO,
            error_detail: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    /// Moves the run into a terminal state.
    ///
    /// Returns `false` without mutating if the run is already terminal or the
    /// transition is not legal; once terminal, a run never changes again.
    pub fn complete(&mut self, state: RunState, error_detail: Option<String>) -> bool {
        if !self.state.can_transition_to(state) || !state.is_terminal() {
            return false;
        }
        self.state = state;
        self.error_detail = error_detail;
        self.completed_at = Some(chrono::Utc::now());
        true
    }
}

/// One step of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub id: Uuid,
    pub run_id: Uuid,
    /// 1-based position; defines execution order.
    pub ordinal: i32,
    pub name: String,
    pub kind: StepKind,
    pub status: StepStatus,
    pub artifact_id: Option<Uuid>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Pipeline step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl PipelineStep {
    /// Builds the pending step rows for a freshly admitted run.
    pub fn for_run(run_id: Uuid, definition: &PipelineDefinition) -> Vec<PipelineStep> {
        definition
            .steps
            .iter()
            .enumerate()
            .map(|(idx, spec)| PipelineStep {
                id: Uuid::new_v4(),
                run_id,
                ordinal: idx as i32 + 1,
                name: spec.name.clone(),
                kind: spec.kind,
                status: StepStatus::Pending,
                artifact_id: None,
                started_at: None,
                completed_at: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(RunState::Ineligible.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Created.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(RunState::Created.can_transition_to(RunState::Validating));
        assert!(RunState::Validating.can_transition_to(RunState::Eligible));
        assert!(RunState::Validating.can_transition_to(RunState::Ineligible));
        assert!(RunState::Eligible.can_transition_to(RunState::Running));
        assert!(RunState::Running.can_transition_to(RunState::Succeeded));
        assert!(RunState::Running.can_transition_to(RunState::Failed));
    }

    #[test]
    fn test_any_non_terminal_state_can_cancel() {
        for state in [
            RunState::Created,
            RunState::Validating,
            RunState::Eligible,
            RunState::Running,
        ] {
            assert!(state.can_transition_to(RunState::Cancelled), "{:?}", state);
        }
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for terminal in [
            RunState::Succeeded,
            RunState::Failed,
            RunState::Cancelled,
            RunState::Ineligible,
        ] {
            for next in [
                RunState::Running,
                RunState::Cancelled,
                RunState::Succeeded,
                RunState::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_illegal_skips_rejected() {
        assert!(!RunState::Created.can_transition_to(RunState::Running));
        assert!(!RunState::Validating.can_transition_to(RunState::Succeeded));
        assert!(!RunState::Running.can_transition_to(RunState::Eligible));
    }

    #[test]
    fn test_complete_is_reentrancy_safe() {
        let mut run = PipelineRun::admitted(Uuid::new_v4(), "tenant-a", Credits::from_major(150));

        assert!(run.complete(RunState::Failed, Some("step 2 failed".to_string())));
        assert_eq!(run.state, RunState::Failed);
        assert!(run.completed_at.is_some());

        // second completion attempt leaves the run untouched
        assert!(!run.complete(RunState::Cancelled, None));
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.error_detail.as_deref(), Some("step 2 failed"));
    }

    #[test]
    fn test_complete_rejects_non_terminal_target() {
        let mut run = PipelineRun::admitted(Uuid::new_v4(), "tenant-a", Credits::from_major(150));
        assert!(!run.complete(RunState::Running, None));
    }

    #[test]
    fn test_steps_for_run_are_ordered_and_pending() {
        let run_id = Uuid::new_v4();
        let steps = PipelineStep::for_run(run_id, &PipelineDefinition::standard());

        assert_eq!(steps.len(), 4);
        for (idx, step) in steps.iter().enumerate() {
            assert_eq!(step.ordinal, idx as i32 + 1);
            assert_eq!(step.run_id, run_id);
            assert_eq!(step.status, StepStatus::Pending);
            assert!(step.artifact_id.is_none());
        }
    }
}
