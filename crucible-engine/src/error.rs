//! Engine error taxonomy
//!
//! Insufficient credits is deliberately absent: it is a normal admission
//! outcome carried in the verdict, not a fault. Step failures are absorbed
//! into the run's `failed` state and never propagate as errors either.

use thiserror::Error;
use uuid::Uuid;

use crate::billing::BillingError;
use crate::store::StoreError;

/// Errors surfaced by the engine's use cases.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("pipeline run {0} not found")]
    RunNotFound(Uuid),

    #[error("invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    /// Transient transport failure; the caller may retry.
    #[error("billing service unavailable: {0}")]
    BillingUnavailable(String),

    /// Permanent configuration problem: billing has never heard of the tenant.
    #[error("tenant {0} unknown to billing service")]
    TenantNotFound(String),

    /// A task may have at most one non-terminal run.
    #[error("task {task_id} already has an active run {run_id}")]
    RunAlreadyActive { task_id: Uuid, run_id: Uuid },

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<BillingError> for EngineError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Unavailable(msg) => EngineError::BillingUnavailable(msg),
            BillingError::TenantNotFound(tenant) => EngineError::TenantNotFound(tenant),
        }
    }
}
