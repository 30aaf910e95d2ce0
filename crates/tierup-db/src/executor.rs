//! # Statement Executor
//!
//! Connection lifecycle for repository calls, written once.
//!
//! ## One Statement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  execute(operation, work)                                               │
//! │                                                                         │
//! │   ResourceHandle::acquire()                                             │
//! │     ├── transaction bound to this task? ──► Bound (lock the tx)         │
//! │     └── otherwise                       ──► Pooled (pool.acquire())     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   work(&mut SqliteConnection)   one statement, one operation            │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   handle.release()              always, exactly once                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   sqlx::Error ──translate()──► DataAccessError                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Unit of Work
//! A unit of work borrows the connection only for the duration of its
//! future, so it cannot leak the handle:
//!
//! ```rust,ignore
//! let id = id.to_string();
//! executor
//!     .execute("get", move |conn| {
//!         Box::pin(async move {
//!             sqlx::query_as::<_, UserRecord>("SELECT ... WHERE id = ?1")
//!                 .bind(id)
//!                 .fetch_all(&mut *conn)
//!                 .await
//!         })
//!     })
//!     .await?;
//! ```

use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, trace};

use tierup_core::{DataAccessError, DataAccessResult};

use crate::error::translate;
use crate::transaction::bound_transaction;

// =============================================================================
// Resource Handle
// =============================================================================

/// A connection acquired for exactly one statement.
pub enum ResourceHandle {
    /// Fresh connection; release returns it to the pool.
    Pooled(PoolConnection<Sqlite>),

    /// Connection of the transaction bound to this task; release hands the
    /// transaction back to its owner.
    Bound {
        tx_id: u64,
        guard: OwnedMutexGuard<Option<Transaction<'static, Sqlite>>>,
    },
}

impl ResourceHandle {
    /// Acquires the bound transaction if there is one, a pooled connection otherwise.
    ///
    /// ## Returns
    /// - `Err(Resource)` on pool timeout, closed pool, or a completed transaction
    pub async fn acquire(pool: &SqlitePool) -> DataAccessResult<Self> {
        if let Some(bound) = bound_transaction() {
            let guard = bound.lock().await?;
            trace!(tx_id = bound.id(), "Using bound transaction");
            return Ok(ResourceHandle::Bound {
                tx_id: bound.id(),
                guard,
            });
        }

        let conn = pool.acquire().await.map_err(translate)?;
        trace!("Acquired pooled connection");
        Ok(ResourceHandle::Pooled(conn))
    }

    /// The live connection.
    pub fn connection(&mut self) -> DataAccessResult<&mut SqliteConnection> {
        match self {
            ResourceHandle::Pooled(conn) => Ok(&mut **conn),
            ResourceHandle::Bound { tx_id, guard } => match &mut **guard {
                Some(tx) => Ok(&mut **tx),
                None => Err(DataAccessError::Resource(format!(
                    "transaction {} is already completed",
                    tx_id
                ))),
            },
        }
    }

    /// Whether this handle belongs to a bound transaction.
    pub fn is_bound(&self) -> bool {
        matches!(self, ResourceHandle::Bound { .. })
    }

    /// Gives the connection back.
    pub fn release(self) {
        match self {
            ResourceHandle::Pooled(conn) => {
                drop(conn);
                trace!("Returned connection to pool");
            }
            ResourceHandle::Bound { tx_id, guard } => {
                drop(guard);
                trace!(tx_id, "Released bound transaction");
            }
        }
    }
}

// =============================================================================
// Statement Executor
// =============================================================================

/// Runs units of work against a resource handle.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    pool: SqlitePool,
}

impl StatementExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        StatementExecutor { pool }
    }

    /// Runs `work` with one acquired connection.
    ///
    /// ## Arguments
    /// * `operation` - name used in logs
    /// * `work` - builds and runs exactly one statement
    ///
    /// ## Returns
    /// The value of `work`, or its error translated, after the handle is released.
    pub async fn execute<T, F>(&self, operation: &'static str, work: F) -> DataAccessResult<T>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>
            + Send,
        T: Send,
    {
        let mut handle = ResourceHandle::acquire(&self.pool).await?;
        let bound = handle.is_bound();

        let result = match handle.connection() {
            Ok(conn) => work(conn).await.map_err(translate),
            Err(e) => Err(e),
        };
        handle.release();

        match &result {
            Ok(_) => debug!(operation, bound, "Statement executed"),
            Err(e) => debug!(operation, bound, error = %e, "Statement failed"),
        }
        result
    }

    /// Runs a parameterless update statement.
    ///
    /// ## Returns
    /// Number of rows affected.
    pub async fn execute_sql(&self, operation: &'static str, sql: &'static str) -> DataAccessResult<u64> {
        self.execute(operation, move |conn| {
            Box::pin(async move {
                sqlx::query(sql)
                    .execute(&mut *conn)
                    .await
                    .map(|done| done.rows_affected())
            })
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::transaction::SqliteTransactionManager;
    use tierup_core::transaction::{bind, TransactionManager};

    #[tokio::test]
    async fn test_execute_sql_reports_rows_affected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let executor = StatementExecutor::new(db.pool().clone());

        let inserted = executor
            .execute_sql(
                "seed",
                "INSERT INTO users (id, name, password, level) VALUES ('a', 'A', 'p', 1), ('b', 'B', 'p', 1)",
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let deleted = executor.execute_sql("delete", "DELETE FROM users").await.unwrap();
        assert_eq!(deleted, 2);
    }

    #[tokio::test]
    async fn test_connection_released_after_failure() {
        // Single-connection pool: a leaked handle would make the second call time out.
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let executor = StatementExecutor::new(db.pool().clone());

        let err = executor
            .execute_sql("broken", "INSERT INTO no_such_table VALUES (1)")
            .await
            .unwrap_err();
        assert!(matches!(err, DataAccessError::Query(_)));

        let count: i64 = executor
            .execute("count", |conn| {
                Box::pin(async move {
                    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                        .fetch_one(&mut *conn)
                        .await
                })
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_bound_transaction_is_used() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let executor = StatementExecutor::new(db.pool().clone());
        let manager = SqliteTransactionManager::new(db.pool().clone());

        let status = manager.begin().await.unwrap();
        bind(status.resource(), async {
            executor
                .execute_sql(
                    "seed",
                    "INSERT INTO users (id, name, password, level) VALUES ('a', 'A', 'p', 1)",
                )
                .await
                .unwrap();
        })
        .await;
        manager.rollback(status).await.unwrap();

        let count: i64 = executor
            .execute("count", |conn| {
                Box::pin(async move {
                    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                        .fetch_one(&mut *conn)
                        .await
                })
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
