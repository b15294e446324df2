//! Data Transfer Objects for the API boundary
//!
//! Commands accepted by the engine's use cases and the result shapes they
//! return to the API layer.

pub mod pipeline;

pub use pipeline::{
    CancelOutcome, CancelPipelineCommand, EligibilityVerdict, FailedStep, RunOutcome,
    RunPipelineCommand, ValidatePipelineCommand,
};
