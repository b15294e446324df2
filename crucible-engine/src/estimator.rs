//! Pipeline cost estimation
//!
//! Pure and deterministic: ValidatePipeline and RunPipeline each call this
//! independently and must get the same answer for the same definition, so the
//! estimator performs no I/O and keeps no state.

use crucible_core::Credits;
use crucible_core::domain::definition::{PipelineDefinition, StepKind};

use crate::error::EngineError;

/// Estimates pipeline execution cost from the definition alone.
///
/// Costs are fixed per step kind. Estimates are advisory; actual cost is
/// recorded on the run as steps complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostEstimator;

impl CostEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Estimated cost of executing the full definition.
    ///
    /// Fails with `InvalidDefinition` on zero steps or blank step names;
    /// total for all other well-formed input.
    pub fn estimate(&self, definition: &PipelineDefinition) -> Result<Credits, EngineError> {
        if definition.steps.is_empty() {
            return Err(EngineError::InvalidDefinition(
                "pipeline has no steps".to_string(),
            ));
        }

        for (idx, step) in definition.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(EngineError::InvalidDefinition(format!(
                    "step {} has an empty name",
                    idx + 1
                )));
            }
        }

        Ok(definition.steps.iter().map(|s| step_cost(s.kind)).sum())
    }
}

/// Fixed cost per step kind.
pub fn step_cost(kind: StepKind) -> Credits {
    match kind {
        StepKind::Analysis => Credits::from_major(50),
        StepKind::UserStories => Credits::from_major(30),
        StepKind::CodeSkeleton => Credits::from_major(40),
        StepKind::TestCases => Credits::from_major(30),
    }
}
