//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline admission, execution and cancellation.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crucible_core::dto::pipeline::{
    CancelOutcome, CancelPipelineCommand, EligibilityVerdict, RunOutcome, RunPipelineCommand,
    ValidatePipelineCommand,
};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /pipeline/validate
/// Read-only eligibility check for a task's pipeline
pub async fn validate_pipeline(
    State(state): State<AppState>,
    Json(command): Json<ValidatePipelineCommand>,
) -> ApiResult<Json<EligibilityVerdict>> {
    tracing::info!("Validating pipeline for task {}", command.task_id);

    let verdict = state.validate.execute(&command).await?;
    Ok(Json(verdict))
}

/// POST /pipeline/run
/// Admit and execute a pipeline run
pub async fn run_pipeline(
    State(state): State<AppState>,
    Json(command): Json<RunPipelineCommand>,
) -> ApiResult<Json<RunOutcome>> {
    tracing::info!("Running pipeline for task {}", command.task_id);

    let outcome = state.run.execute(&command).await?;
    Ok(Json(outcome))
}

/// Body of a cancellation request; the run id comes from the path.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub tenant_id: String,
    pub reason: Option<String>,
}

/// POST /pipeline/{id}/cancel
/// Cooperatively cancel an in-flight run
pub async fn cancel_pipeline(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> ApiResult<Json<CancelOutcome>> {
    tracing::info!("Cancelling pipeline run {}", run_id);

    let command = CancelPipelineCommand {
        run_id,
        tenant_id: request.tenant_id,
        reason: request.reason,
    };
    let outcome = state.cancel.execute(&command).await?;
    Ok(Json(outcome))
}
