use crate::classify;
use medbay_core::storage::{Database, StorageResult, UnitOfWork};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// Pool-backed [`Database`].
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for queries outside a unit of work.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Database for PgDatabase {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> StorageResult<PgUnitOfWork> {
        let tx = self.pool.begin().await.map_err(classify)?;
        Ok(PgUnitOfWork { tx })
    }
}

/// One `READ COMMITTED` transaction.
///
/// Record traits are implemented on this type by the crates that own the
/// schema; they run their statements on [`PgUnitOfWork::conn`].
#[derive(Debug)]
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    /// Connection to run statements on inside this transaction.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> StorageResult<()> {
        self.tx.commit().await.map_err(classify)
    }

    async fn rollback(self) -> StorageResult<()> {
        self.tx.rollback().await.map_err(classify)
    }
}
