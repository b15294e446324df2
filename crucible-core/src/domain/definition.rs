//! Pipeline definition types
//!
//! A definition describes the ordered steps a run will execute. It is caller
//! input, never persisted; the engine validates it and derives step rows and
//! cost estimates from it.

use serde::{Deserialize, Serialize};

/// An ordered pipeline definition.
///
/// Step order is significant: steps may depend on the outputs of earlier
/// steps, so execution follows the declared order exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub steps: Vec<StepSpec>,
}

/// One step of a pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub kind: StepKind,
}

/// The kind of work a step performs. Drives cost estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Analysis,
    UserStories,
    CodeSkeleton,
    TestCases,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Analysis => "analysis",
            StepKind::UserStories => "user_stories",
            StepKind::CodeSkeleton => "code_skeleton",
            StepKind::TestCases => "test_cases",
        }
    }
}

impl PipelineDefinition {
    pub fn new(steps: Vec<StepSpec>) -> Self {
        Self { steps }
    }

    /// The standard four-step pipeline.
    pub fn standard() -> Self {
        Self::new(vec![
            StepSpec {
                name: "analysis".to_string(),
                kind: StepKind::Analysis,
            },
            StepSpec {
                name: "user_stories".to_string(),
                kind: StepKind::UserStories,
            },
            StepSpec {
                name: "code_skeleton".to_string(),
                kind: StepKind::CodeSkeleton,
            },
            StepSpec {
                name: "test_cases".to_string(),
                kind: StepKind::TestCases,
            },
        ])
    }
}
