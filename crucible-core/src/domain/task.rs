//! Task domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work owned by a project.
///
/// Tasks are created by the CRUD layer; the pipeline engine only reads them
/// and updates their status as runs progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub tenant_id: String,
    pub status: TaskStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl Task {
    /// Creates a pending task for a project.
    pub fn new(project_id: Uuid, tenant_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            tenant_id: tenant_id.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = chrono::Utc::now();
    }
}
