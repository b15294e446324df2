//! Pipeline Repository
//!
//! Database operations for runs, steps and artifacts. Costs are stored as
//! BIGINT hundredths; state and status columns hold the snake_case names the
//! rest of the system uses on the wire.

use async_trait::async_trait;
use uuid::Uuid;

use crucible_core::Credits;
use crucible_core::domain::artifact::Artifact;
use crucible_core::domain::definition::StepKind;
use crucible_core::domain::run::{PipelineRun, PipelineStep, RunState, StepStatus};
use crucible_engine::store::{PipelineRepository, StoreError};

use super::{PgUnitOfWork, db_err};

#[async_trait]
impl PipelineRepository for PgUnitOfWork {
    async fn create_run(&mut self, run: &PipelineRun) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_runs (
                id, task_id, tenant_id, state, estimated_cost, actual_cost,
                error_detail, created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(run.id)
        .bind(run.task_id)
        .bind(&run.tenant_id)
        .bind(state_to_string(run.state))
        .bind(run.estimated_cost.hundredths())
        .bind(run.actual_cost.hundredths())
        .bind(&run.error_detail)
        .bind(run.created_at)
        .bind(run.completed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn save_run(&mut self, run: &PipelineRun) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET state = $1, actual_cost = $2, error_detail = $3, completed_at = $4
            WHERE id = $5
            "#,
        )
        .bind(state_to_string(run.state))
        .bind(run.actual_cost.hundredths())
        .bind(&run.error_detail)
        .bind(run.completed_at)
        .bind(run.id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_run(&mut self, run_id: Uuid) -> Result<Option<PipelineRun>, StoreError> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, task_id, tenant_id, state, estimated_cost, actual_cost,
                   error_detail, created_at, completed_at
            FROM pipeline_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(PipelineRun::try_from).transpose()
    }

    async fn active_run_for_task(
        &mut self,
        task_id: Uuid,
    ) -> Result<Option<PipelineRun>, StoreError> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, task_id, tenant_id, state, estimated_cost, actual_cost,
                   error_detail, created_at, completed_at
            FROM pipeline_runs
            WHERE task_id = $1
              AND state NOT IN ('succeeded', 'failed', 'cancelled', 'ineligible')
            "#,
        )
        .bind(task_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(PipelineRun::try_from).transpose()
    }

    async fn save_step(&mut self, step: &PipelineStep) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_steps (
                id, run_id, ordinal, name, kind, status,
                artifact_id, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                artifact_id = EXCLUDED.artifact_id,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(step.id)
        .bind(step.run_id)
        .bind(step.ordinal)
        .bind(&step.name)
        .bind(step.kind.as_str())
        .bind(step_status_to_string(step.status))
        .bind(step.artifact_id)
        .bind(step.started_at)
        .bind(step.completed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn steps_for_run(&mut self, run_id: Uuid) -> Result<Vec<PipelineStep>, StoreError> {
        let rows = sqlx::query_as::<_, StepRow>(
            r#"
            SELECT id, run_id, ordinal, name, kind, status,
                   artifact_id, started_at, completed_at
            FROM pipeline_steps
            WHERE run_id = $1
            ORDER BY ordinal ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(PipelineStep::try_from).collect()
    }

    async fn create_artifact(&mut self, artifact: &Artifact) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO artifacts (
                id, task_id, run_id, step_id, name, content, version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(artifact.id)
        .bind(artifact.task_id)
        .bind(artifact.run_id)
        .bind(artifact.step_id)
        .bind(&artifact.name)
        .bind(&artifact.content)
        .bind(artifact.version)
        .bind(artifact.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn next_artifact_version(
        &mut self,
        task_id: Uuid,
        step_name: &str,
    ) -> Result<i32, StoreError> {
        let (latest,): (i32,) = sqlx::query_as(
            r#"
            SELECT COALESCE(MAX(version), 0)
            FROM artifacts
            WHERE task_id = $1 AND name = $2
            "#,
        )
        .bind(task_id)
        .bind(step_name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(latest + 1)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn state_to_string(state: RunState) -> &'static str {
    match state {
        RunState::Created => "created",
        RunState::Validating => "validating",
        RunState::Eligible => "eligible",
        RunState::Ineligible => "ineligible",
        RunState::Running => "running",
        RunState::Succeeded => "succeeded",
        RunState::Failed => "failed",
        RunState::Cancelled => "cancelled",
    }
}

fn string_to_state(s: &str) -> Result<RunState, StoreError> {
    match s {
        "created" => Ok(RunState::Created),
        "validating" => Ok(RunState::Validating),
        "eligible" => Ok(RunState::Eligible),
        "ineligible" => Ok(RunState::Ineligible),
        "running" => Ok(RunState::Running),
        "succeeded" => Ok(RunState::Succeeded),
        "failed" => Ok(RunState::Failed),
        "cancelled" => Ok(RunState::Cancelled),
        other => Err(StoreError::Backend(format!(
            "unknown run state in database: {}",
            other
        ))),
    }
}

fn step_status_to_string(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::Running => "running",
        StepStatus::Succeeded => "succeeded",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
    }
}

fn string_to_step_status(s: &str) -> Result<StepStatus, StoreError> {
    match s {
        "pending" => Ok(StepStatus::Pending),
        "running" => Ok(StepStatus::Running),
        "succeeded" => Ok(StepStatus::Succeeded),
        "failed" => Ok(StepStatus::Failed),
        "skipped" => Ok(StepStatus::Skipped),
        other => Err(StoreError::Backend(format!(
            "unknown step status in database: {}",
            other
        ))),
    }
}

fn string_to_kind(s: &str) -> Result<StepKind, StoreError> {
    match s {
        "analysis" => Ok(StepKind::Analysis),
        "user_stories" => Ok(StepKind::UserStories),
        "code_skeleton" => Ok(StepKind::CodeSkeleton),
        "test_cases" => Ok(StepKind::TestCases),
        other => Err(StoreError::Backend(format!(
            "unknown step kind in database: {}",
            other
        ))),
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    task_id: Uuid,
    tenant_id: String,
    state: String,
    estimated_cost: i64,
    actual_cost: i64,
    error_detail: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<RunRow> for PipelineRun {
    type Error = StoreError;

    fn try_from(row: RunRow) -> Result<Self, StoreError> {
        Ok(PipelineRun {
            id: row.id,
            task_id: row.task_id,
            tenant_id: row.tenant_id,
            state: string_to_state(&row.state)?,
            estimated_cost: Credits::from_hundredths(row.estimated_cost),
            actual_cost: Credits::from_hundredths(row.actual_cost),
            error_detail: row.error_detail,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    id: Uuid,
    run_id: Uuid,
    ordinal: i32,
    name: String,
    kind: String,
    status: String,
    artifact_id: Option<Uuid>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<StepRow> for PipelineStep {
    type Error = StoreError;

    fn try_from(row: StepRow) -> Result<Self, StoreError> {
        Ok(PipelineStep {
            id: row.id,
            run_id: row.run_id,
            ordinal: row.ordinal,
            name: row.name,
            kind: string_to_kind(&row.kind)?,
            status: string_to_step_status(&row.status)?,
            artifact_id: row.artifact_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}
