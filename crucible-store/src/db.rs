//! Pool construction and schema migrations.
//!
//! Monetary columns are BIGINT hundredths of a credit, matching the
//! fixed-point representation in `crucible_core::Credits`.

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create tasks table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id UUID PRIMARY KEY,
            project_id UUID NOT NULL,
            tenant_id VARCHAR(255) NOT NULL,
            status VARCHAR(50) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pipeline runs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id UUID PRIMARY KEY,
            task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            tenant_id VARCHAR(255) NOT NULL,
            state VARCHAR(50) NOT NULL,
            estimated_cost BIGINT NOT NULL,
            actual_cost BIGINT NOT NULL DEFAULT 0,
            error_detail TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            completed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pipeline steps table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_steps (
            id UUID PRIMARY KEY,
            run_id UUID NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
            ordinal INTEGER NOT NULL,
            name VARCHAR(255) NOT NULL,
            kind VARCHAR(50) NOT NULL,
            status VARCHAR(50) NOT NULL,
            artifact_id UUID,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            UNIQUE (run_id, ordinal)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create artifacts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            id UUID PRIMARY KEY,
            task_id UUID NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            run_id UUID NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
            step_id UUID NOT NULL,
            name VARCHAR(255) NOT NULL,
            content JSONB NOT NULL,
            version INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (task_id, name, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_tenant_id ON tasks(tenant_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pipeline_runs_task_id ON pipeline_runs(task_id)")
        .execute(pool)
        .await?;

    // at most one non-terminal run per task
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_pipeline_runs_active
        ON pipeline_runs(task_id)
        WHERE state NOT IN ('succeeded', 'failed', 'cancelled', 'ineligible')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_steps_run_id ON pipeline_steps(run_id, ordinal)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_artifacts_task_name ON artifacts(task_id, name)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
