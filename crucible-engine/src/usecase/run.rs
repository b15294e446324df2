//! Run Pipeline use case
//!
//! Re-checks eligibility, creates the run and its steps, then drives the
//! steps sequentially in ordinal order. The balance check and the run
//! creation share one unit of work, closing the check-then-act window to a
//! single transactional scope; each step's status transition and artifact
//! commit together before the next step starts, so a crash can only leave
//! the last step's effect unknown.

use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crucible_core::domain::artifact::Artifact;
use crucible_core::domain::run::{PipelineRun, PipelineStep, RunState, StepStatus};
use crucible_core::domain::task::TaskStatus;
use crucible_core::dto::pipeline::{EligibilityVerdict, FailedStep, RunOutcome, RunPipelineCommand};

use crate::audit::{AuditEvent, AuditKind, AuditService, record_best_effort};
use crate::billing::BillingClient;
use crate::cancel::{CancelFlag, CancellationRegistry};
use crate::error::EngineError;
use crate::estimator::{CostEstimator, step_cost};
use crate::executor::{StepContext, StepExecutor};
use crate::store::UnitOfWorkFactory;

/// Executes a task's pipeline end to end.
pub struct RunPipeline {
    store: Arc<dyn UnitOfWorkFactory>,
    billing: Arc<dyn BillingClient>,
    executor: Arc<dyn StepExecutor>,
    audit: Arc<dyn AuditService>,
    estimator: CostEstimator,
    cancellations: CancellationRegistry,
}

impl RunPipeline {
    pub fn new(
        store: Arc<dyn UnitOfWorkFactory>,
        billing: Arc<dyn BillingClient>,
        executor: Arc<dyn StepExecutor>,
        audit: Arc<dyn AuditService>,
        estimator: CostEstimator,
        cancellations: CancellationRegistry,
    ) -> Self {
        Self {
            store,
            billing,
            executor,
            audit,
            estimator,
            cancellations,
        }
    }

    /// Admits and executes a pipeline run for the command's task.
    ///
    /// The eligibility check is always re-executed here — a prior
    /// ValidatePipeline verdict is never trusted, since the balance may have
    /// moved in between. An ineligible attempt persists no run at all.
    pub async fn execute(&self, command: &RunPipelineCommand) -> Result<RunOutcome, EngineError> {
        let estimated_cost = self.estimator.estimate(&command.definition)?;

        // admission and run creation under one unit of work
        let mut uow = self.store.begin().await?;
        let mut task = uow
            .get_task(command.task_id, &command.tenant_id)
            .await?
            .ok_or(EngineError::TaskNotFound(command.task_id))?;

        if let Some(active) = uow.active_run_for_task(task.id).await? {
            return Err(EngineError::RunAlreadyActive {
                task_id: task.id,
                run_id: active.id,
            });
        }

        let current_balance = self.billing.get_balance(&command.tenant_id).await?;

        if current_balance < estimated_cost {
            // no run row for a failed admission; dropping the scope discards it
            drop(uow);
            warn!(
                task_id = %task.id,
                %estimated_cost,
                %current_balance,
                "pipeline run rejected: insufficient credits"
            );
            record_best_effort(
                self.audit.as_ref(),
                AuditEvent::new(
                    AuditKind::AdmissionDenied,
                    &command.tenant_id,
                    task.id,
                    json!({
                        "estimated_cost": estimated_cost,
                        "current_balance": current_balance,
                    }),
                ),
            )
            .await;
            return Ok(RunOutcome::Rejected {
                verdict: EligibilityVerdict::rejected(estimated_cost, current_balance),
            });
        }

        let run = PipelineRun::admitted(task.id, &command.tenant_id, estimated_cost);
        let mut steps = PipelineStep::for_run(run.id, &command.definition);

        uow.create_run(&run).await?;
        for step in &steps {
            uow.save_step(step).await?;
        }
        task.set_status(TaskStatus::Running);
        uow.save_task(&task).await?;
        uow.commit().await?;

        info!(
            run_id = %run.id,
            task_id = %task.id,
            %estimated_cost,
            steps = steps.len(),
            "pipeline run admitted"
        );
        record_best_effort(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditKind::AdmissionGranted,
                &command.tenant_id,
                run.id,
                json!({
                    "task_id": task.id,
                    "estimated_cost": estimated_cost,
                    "current_balance": current_balance,
                }),
            ),
        )
        .await;

        let run_id = run.id;
        let flag = self.cancellations.register(run_id);
        let outcome = self.drive(command, run, &mut steps, &flag).await;
        self.cancellations.remove(run_id);
        outcome
    }

    /// Drives the step loop to a terminal run state.
    async fn drive(
        &self,
        command: &RunPipelineCommand,
        mut run: PipelineRun,
        steps: &mut [PipelineStep],
        flag: &CancelFlag,
    ) -> Result<RunOutcome, EngineError> {
        for idx in 0..steps.len() {
            // cancellation is honored only at step boundaries
            if self.cancelled(&run, flag).await? {
                info!(run_id = %run.id, "pipeline run cancelled between steps");
                self.record_accrued_cost(&run).await?;
                return Ok(RunOutcome::finished(run.id, RunState::Cancelled));
            }

            let ctx = StepContext {
                run_id: run.id,
                task_id: run.task_id,
                tenant_id: command.tenant_id.clone(),
                ordinal: steps[idx].ordinal,
                name: steps[idx].name.clone(),
                kind: steps[idx].kind,
            };

            // one unit of work per step: the status transition and any
            // artifact land together or not at all
            let mut uow = self.store.begin().await?;
            steps[idx].status = StepStatus::Running;
            steps[idx].started_at = Some(chrono::Utc::now());
            uow.save_step(&steps[idx]).await?;

            info!(run_id = %run.id, step = %ctx.name, ordinal = ctx.ordinal, "executing step");

            match self.executor.execute(&ctx).await {
                Ok(output) => {
                    let version = uow.next_artifact_version(run.task_id, &ctx.name).await?;
                    let artifact =
                        Artifact::new(run.task_id, run.id, steps[idx].id, &ctx.name, output.content, version);
                    uow.create_artifact(&artifact).await?;

                    steps[idx].status = StepStatus::Succeeded;
                    steps[idx].artifact_id = Some(artifact.id);
                    steps[idx].completed_at = Some(chrono::Utc::now());
                    uow.save_step(&steps[idx]).await?;
                    uow.commit().await?;

                    run.actual_cost += step_cost(ctx.kind);
                    info!(
                        run_id = %run.id,
                        step = %ctx.name,
                        artifact_id = %artifact.id,
                        version,
                        "step succeeded"
                    );
                }
                Err(failure) => {
                    steps[idx].status = StepStatus::Failed;
                    steps[idx].completed_at = Some(chrono::Utc::now());
                    uow.save_step(&steps[idx]).await?;

                    // no partial silent success: everything after the first
                    // failure is skipped
                    for rest in steps[idx + 1..].iter_mut() {
                        rest.status = StepStatus::Skipped;
                        uow.save_step(rest).await?;
                    }

                    let failed_step = FailedStep {
                        ordinal: ctx.ordinal,
                        name: ctx.name.clone(),
                    };

                    // complete against the persisted run: a concurrent
                    // cancellation may already have made it terminal, and a
                    // terminal run never changes state again
                    let mut stored = uow
                        .get_run(run.id)
                        .await?
                        .ok_or(EngineError::RunNotFound(run.id))?;
                    let failed_now =
                        stored.complete(RunState::Failed, Some(failure.message.clone()));
                    stored.actual_cost = run.actual_cost;
                    uow.save_run(&stored).await?;

                    if failed_now {
                        if let Some(mut task) =
                            uow.get_task(run.task_id, &run.tenant_id).await?
                        {
                            task.set_status(TaskStatus::Failed);
                            uow.save_task(&task).await?;
                        }
                    }
                    uow.commit().await?;

                    if !failed_now {
                        info!(
                            run_id = %run.id,
                            state = ?stored.state,
                            step = %failed_step.name,
                            "run already terminal, step failure not recorded on run"
                        );
                        return Ok(RunOutcome::finished(run.id, stored.state));
                    }

                    error!(
                        run_id = %run.id,
                        step = %failed_step.name,
                        ordinal = failed_step.ordinal,
                        "step failed: {}",
                        failure.message
                    );
                    record_best_effort(
                        self.audit.as_ref(),
                        AuditEvent::new(
                            AuditKind::RunFailed,
                            &run.tenant_id,
                            run.id,
                            json!({
                                "failed_step": failed_step,
                                "error_detail": failure.message,
                            }),
                        ),
                    )
                    .await;

                    return Ok(RunOutcome::Finished {
                        run_id: run.id,
                        final_state: RunState::Failed,
                        failed_step: Some(failed_step),
                        error_detail: Some(failure.message),
                    });
                }
            }
        }

        // a cancellation during the final step is only visible here, so the
        // terminal transition is decided against the persisted run, never the
        // stale in-memory copy
        let mut uow = self.store.begin().await?;
        let mut stored = uow
            .get_run(run.id)
            .await?
            .ok_or(EngineError::RunNotFound(run.id))?;
        let succeeded_now = stored.complete(RunState::Succeeded, None);
        stored.actual_cost = run.actual_cost;
        uow.save_run(&stored).await?;

        if succeeded_now {
            if let Some(mut task) = uow.get_task(run.task_id, &run.tenant_id).await? {
                task.set_status(TaskStatus::Succeeded);
                uow.save_task(&task).await?;
            }
        }
        uow.commit().await?;

        if !succeeded_now {
            info!(
                run_id = %run.id,
                state = ?stored.state,
                "run already terminal, success not recorded"
            );
            return Ok(RunOutcome::finished(run.id, stored.state));
        }

        info!(run_id = %run.id, actual_cost = %run.actual_cost, "pipeline run succeeded");
        record_best_effort(
            self.audit.as_ref(),
            AuditEvent::new(
                AuditKind::RunSucceeded,
                &run.tenant_id,
                run.id,
                json!({ "actual_cost": run.actual_cost }),
            ),
        )
        .await;

        Ok(RunOutcome::finished(run.id, RunState::Succeeded))
    }

    /// Persists the step-cost tally onto an already-cancelled run.
    ///
    /// Cancellation writes the run row before the loop notices, so the
    /// accrual for steps that did complete has to land afterwards.
    async fn record_accrued_cost(&self, run: &PipelineRun) -> Result<(), EngineError> {
        let mut uow = self.store.begin().await?;
        if let Some(mut stored) = uow.get_run(run.id).await? {
            if stored.state == RunState::Cancelled && stored.actual_cost != run.actual_cost {
                stored.actual_cost = run.actual_cost;
                uow.save_run(&stored).await?;
                uow.commit().await?;
            }
        }
        Ok(())
    }

    /// Checks the in-process flag first, then the persisted run state so a
    /// cancellation issued elsewhere is still observed.
    async fn cancelled(&self, run: &PipelineRun, flag: &CancelFlag) -> Result<bool, EngineError> {
        if flag.is_cancelled() {
            return Ok(true);
        }
        let mut uow = self.store.begin().await?;
        let stored = uow.get_run(run.id).await?;
        Ok(matches!(stored, Some(r) if r.state == RunState::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use uuid::Uuid;

    use crucible_core::Credits;
    use crucible_core::domain::definition::{PipelineDefinition, StepKind, StepSpec};
    use crucible_core::domain::task::Task;
    use crucible_core::dto::pipeline::CancelPipelineCommand;

    use crate::audit::testing::RecordingAuditService;
    use crate::executor::{MockStepExecutor, StepFailure, StepOutput};
    use crate::store::memory::MemoryStore;
    use crate::usecase::CancelPipeline;
    use crate::usecase::testing::{StaticBillingClient, definition_costing_500, seeded_store};

    struct Fixture {
        store: MemoryStore,
        audit: RecordingAuditService,
        task: Task,
        usecase: RunPipeline,
    }

    fn fixture(balance: StaticBillingClient, executor: Arc<dyn StepExecutor>) -> Fixture {
        let (store, task) = seeded_store();
        let audit = RecordingAuditService::default();
        let usecase = RunPipeline::new(
            Arc::new(store.clone()),
            Arc::new(balance),
            executor,
            Arc::new(audit.clone()),
            CostEstimator::new(),
            CancellationRegistry::new(),
        );
        Fixture {
            store,
            audit,
            task,
            usecase,
        }
    }

    fn command(task_id: Uuid, definition: PipelineDefinition) -> RunPipelineCommand {
        RunPipelineCommand {
            task_id,
            tenant_id: "tenant-a".to_string(),
            definition,
        }
    }

    fn finished(outcome: &RunOutcome) -> (Uuid, RunState) {
        match outcome {
            RunOutcome::Finished {
                run_id,
                final_state,
                ..
            } => (*run_id, *final_state),
            other => panic!("expected finished outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_run_completes_every_step() {
        let f = fixture(
            StaticBillingClient::with_balance(Credits::from_major(10_000)),
            Arc::new(MockStepExecutor::new()),
        );

        let outcome = f
            .usecase
            .execute(&command(f.task.id, PipelineDefinition::standard()))
            .await
            .unwrap();
        let (run_id, final_state) = finished(&outcome);
        assert_eq!(final_state, RunState::Succeeded);

        let run = f.store.run(run_id).unwrap();
        assert_eq!(run.state, RunState::Succeeded);
        assert_eq!(run.actual_cost, Credits::from_major(150));
        assert!(run.completed_at.is_some());

        let steps = f.store.steps_for_run(run_id);
        assert_eq!(steps.len(), 4);
        for step in &steps {
            assert_eq!(step.status, StepStatus::Succeeded);
            let artifact = f.store.artifact(step.artifact_id.unwrap()).unwrap();
            assert_eq!(artifact.version, 1);
            assert_eq!(artifact.name, step.name);
        }

        let task = f.store.task(f.task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Succeeded);

        assert_eq!(
            f.audit.kinds(),
            vec![AuditKind::AdmissionGranted, AuditKind::RunSucceeded]
        );
    }

    #[tokio::test]
    async fn test_ineligible_run_persists_nothing() {
        // balance=100.00, estimated=500.00
        let f = fixture(
            StaticBillingClient::with_balance(Credits::from_major(100)),
            Arc::new(MockStepExecutor::new()),
        );

        let outcome = f
            .usecase
            .execute(&command(f.task.id, definition_costing_500()))
            .await
            .unwrap();

        match outcome {
            RunOutcome::Rejected { verdict } => {
                assert!(!verdict.eligible);
                assert_eq!(verdict.estimated_cost.to_string(), "500.00");
                assert_eq!(verdict.current_balance.to_string(), "100.00");
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        assert!(f.store.runs_for_task(f.task.id).is_empty());
        assert!(f.store.artifacts_for_task(f.task.id).is_empty());
        assert_eq!(f.store.task(f.task.id).unwrap().status, TaskStatus::Pending);
        assert_eq!(f.audit.kinds(), vec![AuditKind::AdmissionDenied]);
    }

    #[tokio::test]
    async fn test_step_failure_fails_run_and_skips_remainder() {
        // three-step pipeline, step 2 fails
        let f = fixture(
            StaticBillingClient::with_balance(Credits::from_major(10_000)),
            Arc::new(MockStepExecutor::new().failing_at(2)),
        );
        let definition = PipelineDefinition::new(vec![
            StepSpec {
                name: "analysis".to_string(),
                kind: StepKind::Analysis,
            },
            StepSpec {
                name: "user_stories".to_string(),
                kind: StepKind::UserStories,
            },
            StepSpec {
                name: "test_cases".to_string(),
                kind: StepKind::TestCases,
            },
        ]);

        let outcome = f
            .usecase
            .execute(&command(f.task.id, definition))
            .await
            .unwrap();

        match &outcome {
            RunOutcome::Finished {
                final_state,
                failed_step,
                error_detail,
                ..
            } => {
                assert_eq!(*final_state, RunState::Failed);
                let failed = failed_step.as_ref().unwrap();
                assert_eq!(failed.ordinal, 2);
                assert_eq!(failed.name, "user_stories");
                assert!(error_detail.is_some());
            }
            other => panic!("expected finished outcome, got {:?}", other),
        }

        let (run_id, _) = finished(&outcome);
        let steps = f.store.steps_for_run(run_id);
        assert_eq!(steps[0].status, StepStatus::Succeeded);
        assert_eq!(steps[1].status, StepStatus::Failed);
        assert_eq!(steps[2].status, StepStatus::Skipped);

        // the succeeded step keeps its artifact
        assert!(steps[0].artifact_id.is_some());
        assert!(steps[1].artifact_id.is_none());

        let run = f.store.run(run_id).unwrap();
        assert_eq!(run.state, RunState::Failed);
        assert!(run.error_detail.is_some());

        assert_eq!(f.store.task(f.task.id).unwrap().status, TaskStatus::Failed);
        assert_eq!(
            f.audit.kinds(),
            vec![AuditKind::AdmissionGranted, AuditKind::RunFailed]
        );
    }

    /// Executor that records the ordinals it was asked to run.
    struct RecordingExecutor {
        seen: Arc<Mutex<Vec<i32>>>,
        inner: MockStepExecutor,
    }

    #[async_trait]
    impl StepExecutor for RecordingExecutor {
        async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, StepFailure> {
            self.seen.lock().unwrap().push(ctx.ordinal);
            self.inner.execute(ctx).await
        }
    }

    #[tokio::test]
    async fn test_steps_execute_in_strictly_increasing_ordinal_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let f = fixture(
            StaticBillingClient::with_balance(Credits::from_major(10_000)),
            Arc::new(RecordingExecutor {
                seen: seen.clone(),
                inner: MockStepExecutor::new(),
            }),
        );

        f.usecase
            .execute(&command(f.task.id, PipelineDefinition::standard()))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_second_run_increments_artifact_versions() {
        let f = fixture(
            StaticBillingClient::with_balance(Credits::from_major(10_000)),
            Arc::new(MockStepExecutor::new()),
        );
        let cmd = command(f.task.id, PipelineDefinition::standard());

        let first = f.usecase.execute(&cmd).await.unwrap();
        let (_, state) = finished(&first);
        assert_eq!(state, RunState::Succeeded);

        let second = f.usecase.execute(&cmd).await.unwrap();
        let (second_run_id, state) = finished(&second);
        assert_eq!(state, RunState::Succeeded);

        for step in f.store.steps_for_run(second_run_id) {
            let artifact = f.store.artifact(step.artifact_id.unwrap()).unwrap();
            assert_eq!(artifact.version, 2, "step {}", step.name);
        }
    }

    #[tokio::test]
    async fn test_active_run_blocks_a_second_one() {
        let f = fixture(
            StaticBillingClient::with_balance(Credits::from_major(10_000)),
            Arc::new(MockStepExecutor::new()),
        );

        // seed an active run directly
        let active = PipelineRun::admitted(f.task.id, "tenant-a", Credits::from_major(150));
        let mut uow = f.store.begin().await.unwrap();
        uow.create_run(&active).await.unwrap();
        uow.commit().await.unwrap();

        let result = f
            .usecase
            .execute(&command(f.task.id, PipelineDefinition::standard()))
            .await;
        assert!(matches!(
            result,
            Err(EngineError::RunAlreadyActive { run_id, .. }) if run_id == active.id
        ));
    }

    #[tokio::test]
    async fn test_billing_outage_creates_no_run() {
        let f = fixture(
            StaticBillingClient::unavailable(),
            Arc::new(MockStepExecutor::new()),
        );

        let result = f
            .usecase
            .execute(&command(f.task.id, PipelineDefinition::standard()))
            .await;
        assert!(matches!(result, Err(EngineError::BillingUnavailable(_))));
        assert!(f.store.runs_for_task(f.task.id).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_task_is_rejected() {
        let f = fixture(
            StaticBillingClient::with_balance(Credits::from_major(10_000)),
            Arc::new(MockStepExecutor::new()),
        );

        let result = f
            .usecase
            .execute(&command(Uuid::new_v4(), PipelineDefinition::standard()))
            .await;
        assert!(matches!(result, Err(EngineError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_definition_is_rejected_up_front() {
        let f = fixture(
            StaticBillingClient::with_balance(Credits::from_major(10_000)),
            Arc::new(MockStepExecutor::new()),
        );

        let result = f
            .usecase
            .execute(&command(f.task.id, PipelineDefinition::new(vec![])))
            .await;
        assert!(matches!(result, Err(EngineError::InvalidDefinition(_))));
        assert!(f.store.runs_for_task(f.task.id).is_empty());
    }

    /// Executor that issues a cancellation while the given ordinal's work is
    /// in flight, optionally failing that step afterwards.
    struct CancellingExecutor {
        cancel: Arc<CancelPipeline>,
        inner: MockStepExecutor,
        cancel_at: i32,
        fail_after_cancel: bool,
    }

    #[async_trait]
    impl StepExecutor for CancellingExecutor {
        async fn execute(&self, ctx: &StepContext) -> Result<StepOutput, StepFailure> {
            let output = self.inner.execute(ctx).await?;
            if ctx.ordinal == self.cancel_at {
                self.cancel
                    .execute(&CancelPipelineCommand {
                        run_id: ctx.run_id,
                        tenant_id: ctx.tenant_id.clone(),
                        reason: Some("cancelled mid-run".to_string()),
                    })
                    .await
                    .map_err(|e| StepFailure::new(e.to_string()))?;
                if self.fail_after_cancel {
                    return Err(StepFailure::new("step crashed after cancellation"));
                }
            }
            Ok(output)
        }
    }

    fn cancelling_fixture(
        cancel_at: i32,
        fail_after_cancel: bool,
    ) -> (MemoryStore, RecordingAuditService, Task, RunPipeline) {
        let (store, task) = seeded_store();
        let audit = RecordingAuditService::default();
        let registry = CancellationRegistry::new();

        let cancel = Arc::new(CancelPipeline::new(
            Arc::new(store.clone()),
            Arc::new(audit.clone()),
            registry.clone(),
        ));
        let usecase = RunPipeline::new(
            Arc::new(store.clone()),
            Arc::new(StaticBillingClient::with_balance(Credits::from_major(
                10_000,
            ))),
            Arc::new(CancellingExecutor {
                cancel,
                inner: MockStepExecutor::new(),
                cancel_at,
                fail_after_cancel,
            }),
            Arc::new(audit.clone()),
            CostEstimator::new(),
            registry,
        );
        (store, audit, task, usecase)
    }

    fn two_step_definition() -> PipelineDefinition {
        PipelineDefinition::new(vec![
            StepSpec {
                name: "analysis".to_string(),
                kind: StepKind::Analysis,
            },
            StepSpec {
                name: "test_cases".to_string(),
                kind: StepKind::TestCases,
            },
        ])
    }

    #[tokio::test]
    async fn test_cancel_between_steps_keeps_completed_work() {
        // cancel lands after step 1 and before step 2
        let (store, _audit, task, usecase) = cancelling_fixture(1, false);

        let outcome = usecase
            .execute(&command(task.id, two_step_definition()))
            .await
            .unwrap();
        let (run_id, final_state) = finished(&outcome);
        assert_eq!(final_state, RunState::Cancelled);

        let run = store.run(run_id).unwrap();
        assert_eq!(run.state, RunState::Cancelled);
        // the completed step's cost is still accounted for
        assert_eq!(run.actual_cost, Credits::from_major(50));

        let steps = store.steps_for_run(run_id);
        assert_eq!(steps[0].status, StepStatus::Succeeded);
        assert_eq!(steps[1].status, StepStatus::Skipped);

        // the completed step's artifact survives cancellation
        let artifact = store.artifact(steps[0].artifact_id.unwrap()).unwrap();
        assert_eq!(artifact.name, "analysis");
        assert_eq!(artifact.version, 1);

        assert_eq!(store.task(task.id).unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_final_step_keeps_cancelled_state() {
        // cancel lands while the last step is executing; there is no further
        // boundary, so only the terminal scope can observe it
        let (store, _audit, task, usecase) = cancelling_fixture(2, false);

        let outcome = usecase
            .execute(&command(task.id, two_step_definition()))
            .await
            .unwrap();
        let (run_id, final_state) = finished(&outcome);
        assert_eq!(final_state, RunState::Cancelled);

        // the terminal scope must not overwrite the cancelled run
        let run = store.run(run_id).unwrap();
        assert_eq!(run.state, RunState::Cancelled);
        assert_eq!(run.actual_cost, Credits::from_major(80));

        // the step's work finished before the cancellation was observed
        let steps = store.steps_for_run(run_id);
        assert_eq!(steps[1].status, StepStatus::Succeeded);
        assert!(steps[1].artifact_id.is_some());

        assert_eq!(store.task(task.id).unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_step_failure_after_cancel_keeps_cancelled_state() {
        let (store, audit, task, usecase) = cancelling_fixture(2, true);

        let outcome = usecase
            .execute(&command(task.id, two_step_definition()))
            .await
            .unwrap();
        let (run_id, final_state) = finished(&outcome);
        assert_eq!(final_state, RunState::Cancelled);

        // the failure scope must not overwrite the cancelled run either
        let run = store.run(run_id).unwrap();
        assert_eq!(run.state, RunState::Cancelled);
        assert!(run.error_detail.is_none());

        // the step itself still records its failure
        let steps = store.steps_for_run(run_id);
        assert_eq!(steps[0].status, StepStatus::Succeeded);
        assert_eq!(steps[1].status, StepStatus::Failed);

        let task = store.task(task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);

        assert!(!audit.kinds().contains(&AuditKind::RunFailed));
    }
}
