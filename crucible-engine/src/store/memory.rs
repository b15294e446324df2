//! In-memory store
//!
//! Transactional double for the Postgres store, used by automated tests and
//! local wiring. Writes are staged per unit of work and merged into the
//! shared state on commit; a dropped unit of work leaves the shared state
//! untouched, which is exactly the rollback contract.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crucible_core::domain::artifact::Artifact;
use crucible_core::domain::run::{PipelineRun, PipelineStep};
use crucible_core::domain::task::Task;

use super::{PipelineRepository, StoreError, TaskRepository, UnitOfWork, UnitOfWorkFactory};

#[derive(Debug, Default, Clone)]
struct State {
    tasks: HashMap<Uuid, Task>,
    runs: HashMap<Uuid, PipelineRun>,
    steps: HashMap<Uuid, PipelineStep>,
    artifacts: HashMap<Uuid, Artifact>,
}

/// Shared in-memory store. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock poisoned")
    }

    /// Seeds a task directly, bypassing the unit of work. Test setup only.
    pub fn insert_task(&self, task: Task) {
        self.lock().tasks.insert(task.id, task);
    }

    pub fn task(&self, task_id: Uuid) -> Option<Task> {
        self.lock().tasks.get(&task_id).cloned()
    }

    pub fn run(&self, run_id: Uuid) -> Option<PipelineRun> {
        self.lock().runs.get(&run_id).cloned()
    }

    pub fn runs_for_task(&self, task_id: Uuid) -> Vec<PipelineRun> {
        self.lock()
            .runs
            .values()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn steps_for_run(&self, run_id: Uuid) -> Vec<PipelineStep> {
        let mut steps: Vec<PipelineStep> = self
            .lock()
            .steps
            .values()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.ordinal);
        steps
    }

    pub fn artifact(&self, artifact_id: Uuid) -> Option<Artifact> {
        self.lock().artifacts.get(&artifact_id).cloned()
    }

    pub fn artifacts_for_task(&self, task_id: Uuid) -> Vec<Artifact> {
        self.lock()
            .artifacts
            .values()
            .filter(|a| a.task_id == task_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UnitOfWorkFactory for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.state),
            staged: State::default(),
        }))
    }
}

/// One staged scope over a [`MemoryStore`].
struct MemoryUnitOfWork {
    shared: Arc<Mutex<State>>,
    staged: State,
}

impl MemoryUnitOfWork {
    fn shared(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.shared
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TaskRepository for MemoryUnitOfWork {
    async fn get_task(
        &mut self,
        task_id: Uuid,
        tenant_id: &str,
    ) -> Result<Option<Task>, StoreError> {
        let task = match self.staged.tasks.get(&task_id) {
            Some(task) => Some(task.clone()),
            None => self.shared()?.tasks.get(&task_id).cloned(),
        };
        Ok(task.filter(|t| t.tenant_id == tenant_id))
    }

    async fn save_task(&mut self, task: &Task) -> Result<(), StoreError> {
        self.staged.tasks.insert(task.id, task.clone());
        Ok(())
    }
}

#[async_trait]
impl PipelineRepository for MemoryUnitOfWork {
    async fn create_run(&mut self, run: &PipelineRun) -> Result<(), StoreError> {
        self.staged.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn save_run(&mut self, run: &PipelineRun) -> Result<(), StoreError> {
        self.staged.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&mut self, run_id: Uuid) -> Result<Option<PipelineRun>, StoreError> {
        if let Some(run) = self.staged.runs.get(&run_id) {
            return Ok(Some(run.clone()));
        }
        Ok(self.shared()?.runs.get(&run_id).cloned())
    }

    async fn active_run_for_task(
        &mut self,
        task_id: Uuid,
    ) -> Result<Option<PipelineRun>, StoreError> {
        // staged rows shadow shared ones with the same id
        let mut merged: HashMap<Uuid, PipelineRun> = self.shared()?.runs.clone();
        merged.extend(self.staged.runs.clone());

        Ok(merged
            .into_values()
            .find(|r| r.task_id == task_id && !r.state.is_terminal()))
    }

    async fn save_step(&mut self, step: &PipelineStep) -> Result<(), StoreError> {
        self.staged.steps.insert(step.id, step.clone());
        Ok(())
    }

    async fn steps_for_run(&mut self, run_id: Uuid) -> Result<Vec<PipelineStep>, StoreError> {
        let mut merged: HashMap<Uuid, PipelineStep> = self.shared()?.steps.clone();
        merged.extend(self.staged.steps.clone());

        let mut steps: Vec<PipelineStep> = merged
            .into_values()
            .filter(|s| s.run_id == run_id)
            .collect();
        steps.sort_by_key(|s| s.ordinal);
        Ok(steps)
    }

    async fn create_artifact(&mut self, artifact: &Artifact) -> Result<(), StoreError> {
        self.staged.artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn next_artifact_version(
        &mut self,
        task_id: Uuid,
        step_name: &str,
    ) -> Result<i32, StoreError> {
        let mut merged: HashMap<Uuid, Artifact> = self.shared()?.artifacts.clone();
        merged.extend(self.staged.artifacts.clone());

        let latest = merged
            .values()
            .filter(|a| a.task_id == task_id && a.name == step_name)
            .map(|a| a.version)
            .max()
            .unwrap_or(0);
        Ok(latest + 1)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut shared = self
            .shared
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        shared.tasks.extend(self.staged.tasks);
        shared.runs.extend(self.staged.runs);
        shared.steps.extend(self.staged.steps);
        shared.artifacts.extend(self.staged.artifacts);
        Ok(())
    }
}
