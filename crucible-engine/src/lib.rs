//! Crucible Engine
//!
//! The pipeline admission-and-execution core:
//! - Credit-gated admission control against the billing service
//! - The pipeline run state machine and sequential step execution
//! - Versioned artifact production
//! - Cooperative cancellation
//!
//! Everything the engine touches at a boundary — billing, persistence, step
//! execution, audit — is a capability trait defined here. Infrastructure
//! crates implement those traits; the engine never decides how I/O happens.

pub mod audit;
pub mod billing;
pub mod cancel;
pub mod error;
pub mod estimator;
pub mod executor;
pub mod store;
pub mod usecase;

pub use audit::{AuditEvent, AuditKind, AuditService, TracingAuditService};
pub use billing::{BillingClient, BillingError};
pub use cancel::{CancelFlag, CancellationRegistry};
pub use error::EngineError;
pub use estimator::CostEstimator;
pub use executor::{MockStepExecutor, StepContext, StepExecutor, StepFailure, StepOutput};
pub use store::{
    PipelineRepository, StoreError, TaskRepository, UnitOfWork, UnitOfWorkFactory,
    memory::MemoryStore,
};
pub use usecase::{CancelPipeline, RunPipeline, ValidatePipeline};
