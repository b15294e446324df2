//! Cancel Pipeline use case
//!
//! Cancellation is cooperative: pending steps become `skipped`, the run and
//! its task are marked cancelled, and the in-flight step (if any) is left to
//! finish its current unit of work and observe the flag at the next step
//! boundary. Completed steps and their artifacts are always retained.

use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crucible_core::domain::run::{RunState, StepStatus};
use crucible_core::domain::task::TaskStatus;
use crucible_core::dto::pipeline::{CancelOutcome, CancelPipelineCommand};

use crate::audit::{AuditEvent, AuditKind, AuditService, record_best_effort};
use crate::cancel::CancellationRegistry;
use crate::error::EngineError;
use crate::store::UnitOfWorkFactory;

/// Cancels an in-flight pipeline run.
pub struct CancelPipeline {
    store: Arc<dyn UnitOfWorkFactory>,
    audit: Arc<dyn AuditService>,
    cancellations: CancellationRegistry,
}

impl CancelPipeline {
    pub fn new(
        store: Arc<dyn UnitOfWorkFactory>,
        audit: Arc<dyn AuditService>,
        cancellations: CancellationRegistry,
    ) -> Self {
        Self {
            store,
            audit,
            cancellations,
        }
    }

    /// Cancels the run, or reports its state unchanged if already terminal.
    pub async fn execute(
        &self,
        command: &CancelPipelineCommand,
    ) -> Result<CancelOutcome, EngineError> {
        let mut uow = self.store.begin().await?;
        let mut run = uow
            .get_run(command.run_id)
            .await?
            .ok_or(EngineError::RunNotFound(command.run_id))?;

        // runs of other tenants are indistinguishable from missing ones
        if run.tenant_id != command.tenant_id {
            return Err(EngineError::RunNotFound(command.run_id));
        }

        let steps = uow.steps_for_run(run.id).await?;
        let steps_completed = steps
            .iter()
            .filter(|s| s.status == StepStatus::Succeeded)
            .count();

        if run.state.is_terminal() {
            let steps_skipped = steps
                .iter()
                .filter(|s| s.status == StepStatus::Skipped)
                .count();
            // idempotent no-op: nothing is written for a terminal run
            drop(uow);
            info!(run_id = %run.id, state = ?run.state, "cancel requested for terminal run");
            return Ok(CancelOutcome {
                run_id: run.id,
                previous_state: run.state,
                final_state: run.state,
                steps_completed,
                steps_skipped,
            });
        }

        let previous_state = run.state;
        let mut steps_skipped = 0;
        for mut step in steps {
            match step.status {
                StepStatus::Pending => {
                    step.status = StepStatus::Skipped;
                    step.completed_at = Some(chrono::Utc::now());
                    uow.save_step(&step).await?;
                    steps_skipped += 1;
                }
                StepStatus::Skipped => steps_skipped += 1,
                // a running step is asked to stop cooperatively, never forced
                _ => {}
            }
        }

        run.complete(RunState::Cancelled, None);
        uow.save_run(&run).await?;

        if let Some(mut task) = uow.get_task(run.task_id, &command.tenant_id).await? {
            task.set_status(TaskStatus::Cancelled);
            uow.save_task(&task).await?;
        }

        uow.commit().await?;

        // signal after the commit so the run loop observes persisted state
        self.cancellations.signal(run.id);

        record_best_effort(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditKind::RunCancelled,
                &command.tenant_id,
                run.id,
                json!({
                    "reason": command.reason,
                    "previous_state": previous_state,
                    "steps_completed": steps_completed,
                    "steps_skipped": steps_skipped,
                }),
            ),
        )
        .await;

        info!(
            run_id = %run.id,
            ?previous_state,
            steps_completed,
            steps_skipped,
            "pipeline run cancelled"
        );

        Ok(CancelOutcome {
            run_id: run.id,
            previous_state,
            final_state: RunState::Cancelled,
            steps_completed,
            steps_skipped,
        })
    }
}
