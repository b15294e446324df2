//! Pipeline use-case commands and results

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Credits;
use crate::domain::definition::PipelineDefinition;
use crate::domain::run::RunState;

/// Request an eligibility check for a task's pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatePipelineCommand {
    pub task_id: Uuid,
    pub tenant_id: String,
    pub definition: PipelineDefinition,
}

/// Request execution of a task's pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPipelineCommand {
    pub task_id: Uuid,
    pub tenant_id: String,
    pub definition: PipelineDefinition,
}

/// Request cancellation of an in-flight run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPipelineCommand {
    pub run_id: Uuid,
    pub tenant_id: String,
    pub reason: Option<String>,
}

/// Read-only admission verdict. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
    pub estimated_cost: Credits,
    pub current_balance: Credits,
    pub reason: Option<String>,
}

impl EligibilityVerdict {
    pub fn granted(estimated_cost: Credits, current_balance: Credits) -> Self {
        Self {
            eligible: true,
            estimated_cost,
            current_balance,
            reason: None,
        }
    }

    pub fn rejected(estimated_cost: Credits, current_balance: Credits) -> Self {
        Self {
            eligible: false,
            estimated_cost,
            current_balance,
            reason: Some(format!(
                "insufficient credits: required {}, available {}",
                estimated_cost, current_balance
            )),
        }
    }
}

/// Result of a RunPipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Admission failed; no run was persisted.
    Rejected { verdict: EligibilityVerdict },
    /// A run was created and reached a terminal state.
    Finished {
        run_id: Uuid,
        final_state: RunState,
        failed_step: Option<FailedStep>,
        error_detail: Option<String>,
    },
}

impl RunOutcome {
    pub fn finished(run_id: Uuid, final_state: RunState) -> Self {
        RunOutcome::Finished {
            run_id,
            final_state,
            failed_step: None,
            error_detail: None,
        }
    }
}

/// Identity of the step whose failure ended a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedStep {
    pub ordinal: i32,
    pub name: String,
}

/// Result of a CancelPipeline invocation.
///
/// Cancelling an already-terminal run is a no-op: `previous_state` and
/// `final_state` are equal and nothing was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub run_id: Uuid,
    pub previous_state: RunState,
    pub final_state: RunState,
    pub steps_completed: usize,
    pub steps_skipped: usize,
}
