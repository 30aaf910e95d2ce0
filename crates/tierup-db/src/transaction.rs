//! # SQLite Transaction Manager
//!
//! Implements `tierup_core::transaction::TransactionManager` on top of
//! `sqlx::Transaction`.
//!
//! ## Binding
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  begin()                                                                │
//! │    pool.begin_with("BEGIN IMMEDIATE") ──► Transaction<'static, Sqlite>  │
//! │                        │                                                │
//! │                        ▼                                                │
//! │    Arc<BoundTransaction { id, Mutex<Option<Transaction>> }>             │
//! │                        │  bound to the task by TransactionalUserService │
//! │                        ▼                                                │
//! │    StatementExecutor locks it for one statement at a time               │
//! │                        │                                                │
//! │  commit() / rollback() take the Transaction out and finish it           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `BoundTransaction` dropped without commit rolls back (sqlx semantics),
//! so a cancelled or panicking batch leaves no trace.
//!
//! Transactions take the write lock at `begin`. A concurrent batch waits in
//! SQLite's busy handler until the first one finishes, then reads the
//! committed rows.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use tierup_core::transaction::{current_resource, TransactionManager, TransactionStatus};
use tierup_core::{DataAccessError, DataAccessResult};

use crate::error::translate;

/// Opens a transaction holding the write lock from the start.
const BEGIN_IMMEDIATE: &str = "BEGIN IMMEDIATE";

// =============================================================================
// Bound Transaction
// =============================================================================

/// A live transaction shared between the manager and the statement executor.
pub struct BoundTransaction {
    id: u64,
    slot: Arc<Mutex<Option<Transaction<'static, Sqlite>>>>,
}

impl BoundTransaction {
    fn new(id: u64, tx: Transaction<'static, Sqlite>) -> Self {
        BoundTransaction {
            id,
            slot: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Locks the transaction for one statement.
    ///
    /// ## Returns
    /// - `Err(Resource)` if the transaction was already committed or rolled back
    pub(crate) async fn lock(
        &self,
    ) -> DataAccessResult<OwnedMutexGuard<Option<Transaction<'static, Sqlite>>>> {
        let guard = Arc::clone(&self.slot).lock_owned().await;
        if guard.is_none() {
            return Err(DataAccessError::Resource(format!(
                "transaction {} is already completed",
                self.id
            )));
        }
        Ok(guard)
    }

    async fn take(&self) -> DataAccessResult<Transaction<'static, Sqlite>> {
        self.slot.lock().await.take().ok_or_else(|| {
            DataAccessError::Resource(format!("transaction {} is already completed", self.id))
        })
    }
}

impl fmt::Debug for BoundTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundTransaction")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// The transaction bound to the current task, if any.
pub(crate) fn bound_transaction() -> Option<Arc<BoundTransaction>> {
    current_resource::<BoundTransaction>()
}

// =============================================================================
// Transaction Manager
// =============================================================================

/// Transaction manager over a SQLite pool.
///
/// ## Example
/// ```rust,ignore
/// let manager = Arc::new(SqliteTransactionManager::new(db.pool().clone()));
/// let service = TransactionalUserService::new(plain_service, manager);
/// ```
#[derive(Debug, Clone)]
pub struct SqliteTransactionManager {
    pool: SqlitePool,
    next_id: Arc<AtomicU64>,
}

impl SqliteTransactionManager {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteTransactionManager {
            pool,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    fn downcast(status: &TransactionStatus) -> DataAccessResult<Arc<BoundTransaction>> {
        status
            .resource()
            .downcast::<BoundTransaction>()
            .map_err(|_| {
                DataAccessError::Resource(format!(
                    "transaction {} was not started by this manager",
                    status.id()
                ))
            })
    }
}

#[async_trait]
impl TransactionManager for SqliteTransactionManager {
    async fn begin(&self) -> DataAccessResult<TransactionStatus> {
        if let Some(outer) = bound_transaction() {
            debug!(tx_id = outer.id(), "Joining bound transaction");
            return Ok(TransactionStatus::new(outer.id(), false, outer));
        }

        let tx = self
            .pool
            .begin_with(BEGIN_IMMEDIATE)
            .await
            .map_err(translate)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(tx_id = id, "Transaction begun");

        Ok(TransactionStatus::new(
            id,
            true,
            Arc::new(BoundTransaction::new(id, tx)),
        ))
    }

    async fn commit(&self, status: TransactionStatus) -> DataAccessResult<()> {
        if !status.is_new() {
            return Ok(());
        }
        let tx = Self::downcast(&status)?.take().await?;
        tx.commit().await.map_err(translate)?;
        debug!(tx_id = status.id(), "Transaction committed");
        Ok(())
    }

    async fn rollback(&self, status: TransactionStatus) -> DataAccessResult<()> {
        if !status.is_new() {
            return Ok(());
        }
        let tx = Self::downcast(&status)?.take().await?;
        if let Err(e) = tx.rollback().await {
            warn!(tx_id = status.id(), error = %e, "Rollback failed");
            return Err(translate(e));
        }
        debug!(tx_id = status.id(), "Transaction rolled back");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
