//! # Test Doubles
//!
//! In-memory implementations of the core contracts, so that the service and
//! the transaction boundary can be exercised without a database or a mail
//! transport.
//!
//! ```text
//! ┌───────────────────────────┬──────────────────────────────────────────────┐
//! │ InMemoryUserRepository    │ complete repository over a BTreeMap          │
//! │ StubUserRepository        │ fixed get_all, records update, rest fails   │
//! │ FailingUserRepository     │ wraps a repository, update fails for one id  │
//! │ NoopNotifier              │ counts calls                                 │
//! │ RecordingNotifier         │ remembers notified users in order            │
//! │ FailingNotifier           │ records, then fails for one id               │
//! │ FailingPolicy             │ wraps a policy, fails for one id             │
//! └───────────────────────────┴──────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::{
    CoreError, CoreResult, DataAccessError, DataAccessResult, NotificationError,
    NotificationResult,
};
use crate::notification::Notifier;
use crate::policy::UpgradePolicy;
use crate::repository::UserRepository;
use crate::types::{Level, User};

// =============================================================================
// Repositories
// =============================================================================

/// Complete in-memory repository. Iteration order is id ascending.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<BTreeMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-filled with `users` (assumed to carry levels and distinct ids).
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        InMemoryUserRepository {
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn add(&self, user: &User) -> DataAccessResult<()> {
        user.require_level()?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(DataAccessError::duplicate("users.id"));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> DataAccessResult<User> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DataAccessError::not_found("User", id))
    }

    async fn update(&self, user: &User) -> DataAccessResult<()> {
        user.require_level()?;
        if let Some(stored) = self.users.write().await.get_mut(&user.id) {
            *stored = user.clone();
        }
        Ok(())
    }

    async fn get_all(&self) -> DataAccessResult<Vec<User>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn delete_all(&self) -> DataAccessResult<()> {
        self.users.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> DataAccessResult<u64> {
        Ok(self.users.read().await.len() as u64)
    }
}

/// Serves a fixed list from `get_all` and records every `update`.
///
/// Everything else fails with `DataAccessError::Unsupported`, so a service
/// that reaches for an unexpected operation is caught immediately.
#[derive(Debug, Default)]
pub struct StubUserRepository {
    users: Vec<User>,
    updated: Mutex<Vec<User>>,
}

impl StubUserRepository {
    pub fn new(users: Vec<User>) -> Self {
        StubUserRepository {
            users,
            updated: Mutex::new(Vec::new()),
        }
    }

    /// Users passed to `update`, in call order.
    pub async fn updated(&self) -> Vec<User> {
        self.updated.lock().await.clone()
    }
}

#[async_trait]
impl UserRepository for StubUserRepository {
    async fn add(&self, _user: &User) -> DataAccessResult<()> {
        Err(DataAccessError::Unsupported("add"))
    }

    async fn get(&self, _id: &str) -> DataAccessResult<User> {
        Err(DataAccessError::Unsupported("get"))
    }

    async fn update(&self, user: &User) -> DataAccessResult<()> {
        self.updated.lock().await.push(user.clone());
        Ok(())
    }

    async fn get_all(&self) -> DataAccessResult<Vec<User>> {
        Ok(self.users.clone())
    }

    async fn delete_all(&self) -> DataAccessResult<()> {
        Err(DataAccessError::Unsupported("delete_all"))
    }

    async fn count(&self) -> DataAccessResult<u64> {
        Err(DataAccessError::Unsupported("count"))
    }
}

/// Delegates to another repository, but `update` fails for one user id.
pub struct FailingUserRepository {
    inner: Arc<dyn UserRepository>,
    fail_for_id: String,
}

impl FailingUserRepository {
    pub fn new(inner: Arc<dyn UserRepository>, fail_for_id: impl Into<String>) -> Self {
        FailingUserRepository {
            inner,
            fail_for_id: fail_for_id.into(),
        }
    }
}

#[async_trait]
impl UserRepository for FailingUserRepository {
    async fn add(&self, user: &User) -> DataAccessResult<()> {
        self.inner.add(user).await
    }

    async fn get(&self, id: &str) -> DataAccessResult<User> {
        self.inner.get(id).await
    }

    async fn update(&self, user: &User) -> DataAccessResult<()> {
        if user.id == self.fail_for_id {
            return Err(DataAccessError::Query(format!(
                "injected update failure for {}",
                user.id
            )));
        }
        self.inner.update(user).await
    }

    async fn get_all(&self) -> DataAccessResult<Vec<User>> {
        self.inner.get_all().await
    }

    async fn delete_all(&self) -> DataAccessResult<()> {
        self.inner.delete_all().await
    }

    async fn count(&self) -> DataAccessResult<u64> {
        self.inner.count().await
    }
}

// =============================================================================
// Notifiers
// =============================================================================

/// Does nothing, counts calls.
#[derive(Debug, Default)]
pub struct NoopNotifier {
    calls: AtomicUsize,
}

impl NoopNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _user: &User) -> NotificationResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Remembers every notified user, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notified: Mutex<Vec<User>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notified(&self) -> Vec<User> {
        self.notified.lock().await.clone()
    }

    /// Ids of notified users, in order.
    pub async fn ids(&self) -> Vec<String> {
        self.notified
            .lock()
            .await
            .iter()
            .map(|u| u.id.clone())
            .collect()
    }

    /// Addresses notices went to, in order.
    pub async fn recipients(&self) -> Vec<String> {
        self.notified
            .lock()
            .await
            .iter()
            .map(|u| u.email.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user: &User) -> NotificationResult<()> {
        self.notified.lock().await.push(user.clone());
        Ok(())
    }
}

/// Records like [`RecordingNotifier`] but fails delivery for one user id.
#[derive(Debug)]
pub struct FailingNotifier {
    recorder: RecordingNotifier,
    fail_for_id: String,
}

impl FailingNotifier {
    pub fn new(fail_for_id: impl Into<String>) -> Self {
        FailingNotifier {
            recorder: RecordingNotifier::new(),
            fail_for_id: fail_for_id.into(),
        }
    }

    /// Ids that were delivered before the failure.
    pub async fn ids(&self) -> Vec<String> {
        self.recorder.ids().await
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, user: &User) -> NotificationResult<()> {
        if user.id == self.fail_for_id {
            return Err(NotificationError::Delivery {
                to: user.email.clone(),
                reason: "injected delivery failure".to_string(),
            });
        }
        self.recorder.notify(user).await
    }
}

// =============================================================================
// Policies
// =============================================================================

/// Delegates to another policy, but reports invalid state for one user id.
pub struct FailingPolicy {
    inner: Arc<dyn UpgradePolicy>,
    fail_for_id: String,
}

impl FailingPolicy {
    pub fn new(inner: Arc<dyn UpgradePolicy>, fail_for_id: impl Into<String>) -> Self {
        FailingPolicy {
            inner,
            fail_for_id: fail_for_id.into(),
        }
    }
}

impl UpgradePolicy for FailingPolicy {
    fn evaluate(&self, user: &User) -> CoreResult<Option<Level>> {
        if user.id == self.fail_for_id {
            return Err(CoreError::LevelNotAssigned {
                id: user.id.clone(),
            });
        }
        self.inner.evaluate(user)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Five users straddling every threshold.
///
/// ```text
///   id      level   login  recommend   after upgrade
///   anna    BASIC   49     0           BASIC
///   brian   BASIC   50     0           SILVER
///   carol   SILVER  60     29          SILVER
///   derek   SILVER  60     30          GOLD
///   elise   GOLD    100    100         GOLD
/// ```
pub fn sample_users() -> Vec<User> {
    vec![
        User::new("anna", "Anna Berg", "p1", "anna@example.com")
            .with_level(Level::Basic)
            .with_login(49),
        User::new("brian", "Brian Cole", "p2", "brian@example.com")
            .with_level(Level::Basic)
            .with_login(50),
        User::new("carol", "Carol Diaz", "p3", "carol@example.com")
            .with_level(Level::Silver)
            .with_login(60)
            .with_recommend(29),
        User::new("derek", "Derek Ford", "p4", "derek@example.com")
            .with_level(Level::Silver)
            .with_login(60)
            .with_recommend(30),
        User::new("elise", "Elise Hart", "p5", "elise@example.com")
            .with_level(Level::Gold)
            .with_login(100)
            .with_recommend(100),
    ]
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_repository_contract() {
        let repo = InMemoryUserRepository::new();
        for user in sample_users().into_iter().rev() {
            repo.add(&user).await.unwrap();
        }
        assert_eq!(repo.count().await.unwrap(), 5);

        let ids: Vec<String> = repo.get_all().await.unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, ["anna", "brian", "carol", "derek", "elise"]);

        let dup = repo.add(&sample_users()[0]).await.unwrap_err();
        assert!(dup.is_duplicate_key());

        repo.delete_all().await.unwrap();
        assert!(matches!(
            repo.get("anna").await,
            Err(DataAccessError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_in_memory_repository_rejects_missing_level() {
        let repo = InMemoryUserRepository::new();
        let user = User::new("x", "X", "p", "x@example.com");
        assert!(matches!(
            repo.add(&user).await,
            Err(DataAccessError::InvalidState(CoreError::LevelNotAssigned { .. }))
        ));
    }

    #[tokio::test]
    async fn test_stub_repository_fails_fast() {
        let repo = StubUserRepository::new(sample_users());
        assert_eq!(repo.get_all().await.unwrap().len(), 5);
        assert!(matches!(
            repo.get("anna").await,
            Err(DataAccessError::Unsupported("get"))
        ));
        repo.update(&sample_users()[1]).await.unwrap();
        assert_eq!(repo.updated().await.len(), 1);
    }

    #[tokio::test]
    async fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        let users = sample_users();
        notifier.notify(&users[3]).await.unwrap();
        notifier.notify(&users[1]).await.unwrap();
        assert_eq!(notifier.ids().await, ["derek", "brian"]);
        assert_eq!(
            notifier.recipients().await,
            ["derek@example.com", "brian@example.com"]
        );
    }
}
