//! Persistence capability
//!
//! Repository contracts plus the Unit of Work boundary. A unit of work scopes
//! one use-case invocation's writes: everything staged through it commits
//! atomically via `commit`, and dropping it without committing rolls the
//! scope back. Use cases acquire a fresh unit of work per transactional
//! scope through the factory.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crucible_core::domain::artifact::Artifact;
use crucible_core::domain::run::{PipelineRun, PipelineStep};
use crucible_core::domain::task::Task;

pub mod memory;

/// Storage-level failure.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Backend(String),
}

/// Task persistence contract.
#[async_trait]
pub trait TaskRepository: Send {
    /// Loads a task scoped to its owning tenant. `None` covers both a missing
    /// task and a tenant mismatch, so ownership never leaks.
    async fn get_task(&mut self, task_id: Uuid, tenant_id: &str)
    -> Result<Option<Task>, StoreError>;

    async fn save_task(&mut self, task: &Task) -> Result<(), StoreError>;
}

/// Pipeline run, step and artifact persistence contract.
#[async_trait]
pub trait PipelineRepository: Send {
    async fn create_run(&mut self, run: &PipelineRun) -> Result<(), StoreError>;

    async fn save_run(&mut self, run: &PipelineRun) -> Result<(), StoreError>;

    async fn get_run(&mut self, run_id: Uuid) -> Result<Option<PipelineRun>, StoreError>;

    /// The task's non-terminal run, if any. At most one exists.
    async fn active_run_for_task(
        &mut self,
        task_id: Uuid,
    ) -> Result<Option<PipelineRun>, StoreError>;

    /// Inserts or updates a step.
    async fn save_step(&mut self, step: &PipelineStep) -> Result<(), StoreError>;

    /// All steps of a run, ordered by ordinal.
    async fn steps_for_run(&mut self, run_id: Uuid) -> Result<Vec<PipelineStep>, StoreError>;

    /// Artifacts are immutable; there is no update.
    async fn create_artifact(&mut self, artifact: &Artifact) -> Result<(), StoreError>;

    /// Next version for an artifact of this step name within a task,
    /// starting at 1.
    async fn next_artifact_version(
        &mut self,
        task_id: Uuid,
        step_name: &str,
    ) -> Result<i32, StoreError>;
}

/// One transactional scope over the repositories.
#[async_trait]
pub trait UnitOfWork: TaskRepository + PipelineRepository + Send {
    /// Commits every write staged in this scope. Dropping a unit of work
    /// without calling this rolls the scope back.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Opens unit-of-work scopes.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}
