//! Task Repository
//!
//! Database operations for tasks. Reads are always tenant-scoped.

use async_trait::async_trait;
use uuid::Uuid;

use crucible_core::domain::task::{Task, TaskStatus};
use crucible_engine::store::{StoreError, TaskRepository};

use super::{PgUnitOfWork, db_err};

#[async_trait]
impl TaskRepository for PgUnitOfWork {
    async fn get_task(
        &mut self,
        task_id: Uuid,
        tenant_id: &str,
    ) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, project_id, tenant_id, status, created_at, updated_at
            FROM tasks
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(task_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(Task::try_from).transpose()
    }

    async fn save_task(&mut self, task: &Task) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, project_id, tenant_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(task.id)
        .bind(task.project_id)
        .bind(&task.tenant_id)
        .bind(status_to_string(task.status))
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

pub(crate) fn status_to_string(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Succeeded => "succeeded",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn string_to_status(s: &str) -> Result<TaskStatus, StoreError> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "running" => Ok(TaskStatus::Running),
        "succeeded" => Ok(TaskStatus::Succeeded),
        "failed" => Ok(TaskStatus::Failed),
        "cancelled" => Ok(TaskStatus::Cancelled),
        other => Err(StoreError::Backend(format!(
            "unknown task status in database: {}",
            other
        ))),
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    project_id: Uuid,
    tenant_id: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, StoreError> {
        Ok(Task {
            id: row.id,
            project_id: row.project_id,
            tenant_id: row.tenant_id,
            status: string_to_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
