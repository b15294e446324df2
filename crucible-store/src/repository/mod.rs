//! Unit-of-work plumbing over Postgres
//!
//! Each unit of work owns one `sqlx` transaction. The repository trait
//! implementations live in their own modules and all execute against that
//! transaction, so a use case's writes land atomically or not at all.

mod pipeline;
mod tasks;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crucible_engine::store::{StoreError, UnitOfWork, UnitOfWorkFactory};

/// Postgres-backed store. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One open transaction. Dropping it without commit rolls back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_err)
    }
}

pub(crate) fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}
