//! Artifact domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output produced by a pipeline step.
///
/// Artifacts are immutable once created. Re-executing a step produces a new
/// artifact with an incremented version; prior versions are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub task_id: Uuid,
    pub run_id: Uuid,
    pub step_id: Uuid,
    pub name: String,
    pub content: serde_json::Value,
    pub version: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Artifact {
    pub fn new(
        task_id: Uuid,
        run_id: Uuid,
        step_id: Uuid,
        name: impl Into<String>,
        content: serde_json::Value,
        version: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            run_id,
            step_id,
            name: name.into(),
            content,
            version,
            created_at: chrono::Utc::now(),
        }
    }
}
