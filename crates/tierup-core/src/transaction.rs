//! # Transaction Boundary
//!
//! All-or-nothing execution of `UserService` calls.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    TransactionalUserService                             │
//! │                                                                         │
//! │   manager.begin() ──► TransactionStatus { id, is_new, resource }        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   bind(resource, inner.upgrade_levels())                                │
//! │        │   repository calls on this task pick up the bound resource     │
//! │        │                                                                │
//! │        ├── Ok  ──► manager.commit(status)   ──► Ok(value)               │
//! │        └── Err ──► manager.rollback(status) ──► Err(first error)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Task Binding
//! The bound resource lives in a tokio task-local. It is visible to every
//! future polled inside [`bind`] on the same task and invisible to spawned
//! tasks, so concurrent callers never share a transaction.
//!
//! The resource is opaque here (`Arc<dyn Any>`); the database layer decides
//! what it is and downcasts it with [`current_resource`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::{DataAccessResult, ServiceError, ServiceResult};
use crate::service::{UpgradeSummary, UserService};
use crate::types::User;

// =============================================================================
// Task Binding
// =============================================================================

/// Opaque transaction resource handed out by a [`TransactionManager`].
pub type TransactionResource = Arc<dyn Any + Send + Sync>;

tokio::task_local! {
    static BOUND_TRANSACTION: TransactionResource;
}

/// Runs `fut` with `resource` bound to the current task.
pub async fn bind<F>(resource: TransactionResource, fut: F) -> F::Output
where
    F: Future,
{
    BOUND_TRANSACTION.scope(resource, fut).await
}

/// The resource bound to the current task, if it is a `T`.
pub fn current_resource<T>() -> Option<Arc<T>>
where
    T: Any + Send + Sync,
{
    BOUND_TRANSACTION
        .try_with(Arc::clone)
        .ok()
        .and_then(|resource| resource.downcast::<T>().ok())
}

/// Whether any transaction is bound to the current task.
pub fn is_bound() -> bool {
    BOUND_TRANSACTION.try_with(|_| ()).is_ok()
}

// =============================================================================
// Transaction Manager Contract
// =============================================================================

/// Handle returned by [`TransactionManager::begin`].
pub struct TransactionStatus {
    id: u64,
    is_new: bool,
    resource: TransactionResource,
}

impl TransactionStatus {
    pub fn new(id: u64, is_new: bool, resource: TransactionResource) -> Self {
        TransactionStatus {
            id,
            is_new,
            resource,
        }
    }

    /// Identifier used in logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// False when `begin` joined a transaction already bound to the task.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn resource(&self) -> TransactionResource {
        Arc::clone(&self.resource)
    }
}

impl fmt::Debug for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionStatus")
            .field("id", &self.id)
            .field("is_new", &self.is_new)
            .finish_non_exhaustive()
    }
}

/// Begins, commits and rolls back transactions.
///
/// ## Joining
/// `begin` while a transaction is bound to the current task must return a
/// joined status (`is_new == false`). Commit and rollback of a joined status
/// do nothing; the outer owner decides.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> DataAccessResult<TransactionStatus>;

    async fn commit(&self, status: TransactionStatus) -> DataAccessResult<()>;

    async fn rollback(&self, status: TransactionStatus) -> DataAccessResult<()>;
}

// =============================================================================
// Transactional Service Decorator
// =============================================================================

/// Wraps any `UserService` so that each call commits or rolls back as a unit.
///
/// ## Example
/// ```rust,ignore
/// let plain: Arc<dyn UserService> = Arc::new(UserServiceImpl::new(repo, notifier, policy));
/// let service: Arc<dyn UserService> =
///     Arc::new(TransactionalUserService::new(plain, db.transaction_manager()));
///
/// service.upgrade_levels().await?; // all upgrades or none
/// ```
pub struct TransactionalUserService {
    inner: Arc<dyn UserService>,
    manager: Arc<dyn TransactionManager>,
}

impl TransactionalUserService {
    pub fn new(inner: Arc<dyn UserService>, manager: Arc<dyn TransactionManager>) -> Self {
        TransactionalUserService { inner, manager }
    }

    /// Runs `work` inside one transaction.
    ///
    /// ## Returns
    /// - the value of `work` after a successful commit
    /// - the error of `work`, unchanged, after rollback
    /// - `ServiceError::Transaction` if begin or commit fails
    async fn run<T, F>(&self, operation: &'static str, work: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>> + Send,
        T: Send,
    {
        let status = self
            .manager
            .begin()
            .await
            .map_err(|e| ServiceError::transaction("begin", e))?;
        let tx_id = status.id();
        debug!(tx_id, operation, is_new = status.is_new(), "Transaction started");

        match bind(status.resource(), work).await {
            Ok(value) => {
                self.manager
                    .commit(status)
                    .await
                    .map_err(|e| ServiceError::transaction("commit", e))?;
                debug!(tx_id, operation, "Transaction committed");
                Ok(value)
            }
            Err(err) => {
                match self.manager.rollback(status).await {
                    Ok(()) => warn!(tx_id, operation, error = %err, "Transaction rolled back"),
                    Err(rollback_err) => error!(
                        tx_id,
                        operation,
                        error = %err,
                        rollback_error = %rollback_err,
                        "Rollback failed"
                    ),
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl UserService for TransactionalUserService {
    async fn add(&self, user: User) -> ServiceResult<User> {
        self.run("add", self.inner.add(user)).await
    }

    async fn upgrade_levels(&self) -> ServiceResult<UpgradeSummary> {
        self.run("upgrade_levels", self.inner.upgrade_levels()).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DataAccessError, NotificationError};
    use crate::types::Level;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Mutex;

    /// Marker stored as the bound resource.
    struct FakeTx(u64);

    #[derive(Default)]
    struct RecordingManager {
        next_id: AtomicU64,
        events: Mutex<Vec<String>>,
        fail_begin: bool,
        fail_commit: bool,
        fail_rollback: bool,
    }

    impl RecordingManager {
        async fn events(&self) -> Vec<String> {
            self.events.lock().await.clone()
        }
    }

    #[async_trait]
    impl TransactionManager for RecordingManager {
        async fn begin(&self) -> DataAccessResult<TransactionStatus> {
            if let Some(outer) = current_resource::<FakeTx>() {
                self.events.lock().await.push(format!("join {}", outer.0));
                return Ok(TransactionStatus::new(outer.0, false, outer));
            }
            if self.fail_begin {
                return Err(DataAccessError::Resource("pool closed".to_string()));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.events.lock().await.push(format!("begin {id}"));
            Ok(TransactionStatus::new(id, true, Arc::new(FakeTx(id))))
        }

        async fn commit(&self, status: TransactionStatus) -> DataAccessResult<()> {
            if !status.is_new() {
                return Ok(());
            }
            if self.fail_commit {
                return Err(DataAccessError::Resource("disk full".to_string()));
            }
            self.events.lock().await.push(format!("commit {}", status.id()));
            Ok(())
        }

        async fn rollback(&self, status: TransactionStatus) -> DataAccessResult<()> {
            if !status.is_new() {
                return Ok(());
            }
            if self.fail_rollback {
                return Err(DataAccessError::Resource("connection lost".to_string()));
            }
            self.events.lock().await.push(format!("rollback {}", status.id()));
            Ok(())
        }
    }

    /// Service that reports which transaction it saw, then succeeds or fails.
    struct ObservingService {
        fail: bool,
        seen: Mutex<Vec<Option<u64>>>,
    }

    impl ObservingService {
        fn new(fail: bool) -> Self {
            ObservingService {
                fail,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UserService for ObservingService {
        async fn add(&self, user: User) -> ServiceResult<User> {
            self.seen
                .lock()
                .await
                .push(current_resource::<FakeTx>().map(|tx| tx.0));
            Ok(user)
        }

        async fn upgrade_levels(&self) -> ServiceResult<UpgradeSummary> {
            self.seen
                .lock()
                .await
                .push(current_resource::<FakeTx>().map(|tx| tx.0));
            if self.fail {
                return Err(NotificationError::Delivery {
                    to: "derek@example.com".to_string(),
                    reason: "smtp down".to_string(),
                }
                .into());
            }
            Ok(UpgradeSummary::default())
        }
    }

    fn wrap(inner: Arc<ObservingService>, manager: Arc<RecordingManager>) -> TransactionalUserService {
        TransactionalUserService::new(inner, manager)
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let inner = Arc::new(ObservingService::new(false));
        let manager = Arc::new(RecordingManager::default());
        let service = wrap(inner.clone(), manager.clone());

        service.upgrade_levels().await.unwrap();

        assert_eq!(manager.events().await, ["begin 1", "commit 1"]);
        assert_eq!(*inner.seen.lock().await, [Some(1)]);
        assert!(!is_bound());
    }

    #[tokio::test]
    async fn test_rollback_returns_work_error() {
        let inner = Arc::new(ObservingService::new(true));
        let manager = Arc::new(RecordingManager::default());
        let service = wrap(inner, manager.clone());

        let err = service.upgrade_levels().await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Notification(NotificationError::Delivery { .. })
        ));
        assert_eq!(manager.events().await, ["begin 1", "rollback 1"]);
    }

    #[tokio::test]
    async fn test_failed_rollback_does_not_mask_error() {
        let inner = Arc::new(ObservingService::new(true));
        let manager = Arc::new(RecordingManager {
            fail_rollback: true,
            ..Default::default()
        });
        let err = wrap(inner, manager).upgrade_levels().await.unwrap_err();
        assert!(matches!(err, ServiceError::Notification(_)));
    }

    #[tokio::test]
    async fn test_commit_failure_is_transaction_error() {
        let inner = Arc::new(ObservingService::new(false));
        let manager = Arc::new(RecordingManager {
            fail_commit: true,
            ..Default::default()
        });
        let err = wrap(inner, manager).upgrade_levels().await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Transaction {
                stage: "commit",
                source: DataAccessError::Resource(_),
            }
        ));
    }

    #[tokio::test]
    async fn test_begin_failure_keeps_resource_error() {
        let inner = Arc::new(ObservingService::new(false));
        let manager = Arc::new(RecordingManager {
            fail_begin: true,
            ..Default::default()
        });
        let err = wrap(inner.clone(), manager.clone())
            .upgrade_levels()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Transaction {
                stage: "begin",
                source: DataAccessError::Resource(_),
            }
        ));
        assert!(inner.seen.lock().await.is_empty());
        assert!(manager.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_runs_in_transaction() {
        let inner = Arc::new(ObservingService::new(false));
        let manager = Arc::new(RecordingManager::default());
        let service = wrap(inner.clone(), manager.clone());

        let user = User::new("anna", "Anna Berg", "p1", "anna@example.com").with_level(Level::Basic);
        assert_eq!(service.add(user.clone()).await.unwrap(), user);
        assert_eq!(manager.events().await, ["begin 1", "commit 1"]);
        assert_eq!(*inner.seen.lock().await, [Some(1)]);
    }

    #[tokio::test]
    async fn test_nested_boundary_joins_outer_transaction() {
        let inner = Arc::new(ObservingService::new(false));
        let manager = Arc::new(RecordingManager::default());
        let service = Arc::new(wrap(inner.clone(), manager.clone()));
        let outer = wrap_dyn(service, manager.clone());

        outer.upgrade_levels().await.unwrap();

        assert_eq!(manager.events().await, ["begin 1", "join 1", "commit 1"]);
        assert_eq!(*inner.seen.lock().await, [Some(1)]);
    }

    fn wrap_dyn(
        inner: Arc<dyn UserService>,
        manager: Arc<RecordingManager>,
    ) -> TransactionalUserService {
        TransactionalUserService::new(inner, manager)
    }

    #[tokio::test]
    async fn test_binding_is_not_inherited_by_spawned_tasks() {
        let seen_in_spawned = bind(Arc::new(FakeTx(9)), async {
            assert_eq!(current_resource::<FakeTx>().map(|tx| tx.0), Some(9));
            tokio::spawn(async { current_resource::<FakeTx>().is_some() })
                .await
                .unwrap()
        })
        .await;
        assert!(!seen_in_spawned);
    }

    #[tokio::test]
    async fn test_current_resource_checks_type() {
        bind(Arc::new(FakeTx(3)), async {
            assert!(is_bound());
            assert!(current_resource::<String>().is_none());
        })
        .await;
    }
}
