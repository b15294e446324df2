//! Validate Pipeline use case
//!
//! The read-only admission gate: estimates cost, fetches the tenant's
//! balance, and returns an eligibility verdict. Performs no writes and no
//! reservation, so a second call with an unchanged balance returns an
//! identical verdict.

use std::sync::Arc;
use tracing::{info, warn};

use crucible_core::dto::pipeline::{EligibilityVerdict, ValidatePipelineCommand};

use crate::billing::BillingClient;
use crate::error::EngineError;
use crate::estimator::CostEstimator;
use crate::store::UnitOfWorkFactory;

/// Checks whether a task's pipeline may proceed.
pub struct ValidatePipeline {
    store: Arc<dyn UnitOfWorkFactory>,
    billing: Arc<dyn BillingClient>,
    estimator: CostEstimator,
}

impl ValidatePipeline {
    pub fn new(
        store: Arc<dyn UnitOfWorkFactory>,
        billing: Arc<dyn BillingClient>,
        estimator: CostEstimator,
    ) -> Self {
        Self {
            store,
            billing,
            estimator,
        }
    }

    /// Produces an eligibility verdict for the command's task and definition.
    ///
    /// `InsufficientCredits` is not an error: an ineligible verdict is a
    /// normal outcome. Billing failures propagate as-is — admission cannot be
    /// decided without a balance.
    pub async fn execute(
        &self,
        command: &ValidatePipelineCommand,
    ) -> Result<EligibilityVerdict, EngineError> {
        let mut uow = self.store.begin().await?;
        let task = uow
            .get_task(command.task_id, &command.tenant_id)
            .await?
            .ok_or(EngineError::TaskNotFound(command.task_id))?;
        // read-only use case; release the scope before any I/O
        drop(uow);

        let estimated_cost = self.estimator.estimate(&command.definition)?;
        let current_balance = self.billing.get_balance(&command.tenant_id).await?;

        if current_balance >= estimated_cost {
            info!(
                task_id = %task.id,
                %estimated_cost,
                %current_balance,
                "pipeline validation passed"
            );
            Ok(EligibilityVerdict::granted(estimated_cost, current_balance))
        } else {
            warn!(
                task_id = %task.id,
                %estimated_cost,
                %current_balance,
                "pipeline validation failed: insufficient credits"
            );
            Ok(EligibilityVerdict::rejected(estimated_cost, current_balance))
        }
    }
}
