//! # Service Wiring
//!
//! Composes the SQLite repository, a notifier and an upgrade policy into a
//! transactional `UserService`.
//!
//! ```text
//!   Arc<dyn UserService>
//!        │
//!        ▼
//!   TransactionalUserService ── SqliteTransactionManager
//!        │
//!        ▼
//!   UserServiceImpl ── SqliteUserRepository
//!                   ── dyn Notifier
//!                   ── dyn UpgradePolicy
//! ```

use std::sync::Arc;

use tracing::info;

use tierup_core::testing::sample_users;
use tierup_core::{
    Notifier, ServiceResult, TransactionalUserService, UpgradePolicy, UserRepository, UserService,
    UserServiceImpl,
};

use crate::pool::Database;

/// Transactional service over the database's own user repository.
pub fn user_service(
    db: &Database,
    notifier: Arc<dyn Notifier>,
    policy: Arc<dyn UpgradePolicy>,
) -> Arc<dyn UserService> {
    transactional_user_service(db, Arc::new(db.users()), notifier, policy)
}

/// Transactional service over any repository that uses this database's pool.
pub fn transactional_user_service(
    db: &Database,
    repository: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    policy: Arc<dyn UpgradePolicy>,
) -> Arc<dyn UserService> {
    let plain: Arc<dyn UserService> = Arc::new(UserServiceImpl::new(repository, notifier, policy));
    Arc::new(TransactionalUserService::new(
        plain,
        Arc::new(db.transaction_manager()),
    ))
}

/// Adds the sample users when the table is empty.
///
/// ## Returns
/// Number of users added (0 if the table already had rows).
pub async fn seed_sample_users(db: &Database, service: &dyn UserService) -> ServiceResult<usize> {
    let existing = db.users().count().await?;
    if existing > 0 {
        info!(existing, "Users already present, skipping seed");
        return Ok(0);
    }

    let users = sample_users();
    let count = users.len();
    for user in users {
        service.add(user).await?;
    }
    info!(count, "Seeded sample users");
    Ok(count)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{remove_db_files, temp_db_path, DbConfig};
    use tierup_core::testing::{FailingNotifier, FailingPolicy, FailingUserRepository, RecordingNotifier};
    use tierup_core::{
        CoreError, DataAccessError, Level, NotificationError, ServiceError, StandardUpgradePolicy,
        User,
    };

    async fn seeded() -> Database {
        seeded_with(DbConfig::in_memory()).await
    }

    async fn seeded_with(config: DbConfig) -> Database {
        let db = Database::new(config).await.unwrap();
        let repo = db.users();
        for user in sample_users() {
            repo.add(&user).await.unwrap();
        }
        db
    }

    async fn levels(db: &Database) -> Vec<(String, Option<Level>)> {
        db.users()
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| (u.id, u.level))
            .collect()
    }

    fn seeded_levels() -> Vec<(String, Option<Level>)> {
        sample_users().into_iter().map(|u| (u.id, u.level)).collect()
    }

    fn standard() -> Arc<dyn UpgradePolicy> {
        Arc::new(StandardUpgradePolicy::new())
    }

    #[tokio::test]
    async fn test_upgrade_levels_end_to_end() {
        let db = seeded().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let service = user_service(&db, notifier.clone(), standard());

        let summary = service.upgrade_levels().await.unwrap();

        assert_eq!(summary.upgraded, ["brian", "derek"]);
        assert_eq!(
            levels(&db).await,
            [
                ("anna".to_string(), Some(Level::Basic)),
                ("brian".to_string(), Some(Level::Silver)),
                ("carol".to_string(), Some(Level::Silver)),
                ("derek".to_string(), Some(Level::Gold)),
                ("elise".to_string(), Some(Level::Gold)),
            ]
        );
        assert_eq!(notifier.ids().await, ["brian", "derek"]);
    }

    #[tokio::test]
    async fn test_notification_failure_rolls_back_whole_batch() {
        let db = seeded().await;
        let notifier = Arc::new(FailingNotifier::new("derek"));
        let service = user_service(&db, notifier.clone(), standard());

        let err = service.upgrade_levels().await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Notification(NotificationError::Delivery { .. })
        ));
        // brian was updated and notified before derek failed; the update is gone.
        assert_eq!(notifier.ids().await, ["brian"]);
        assert_eq!(levels(&db).await, seeded_levels());
    }

    #[tokio::test]
    async fn test_update_failure_rolls_back_whole_batch() {
        let db = seeded().await;
        let repo = Arc::new(FailingUserRepository::new(Arc::new(db.users()), "derek"));
        let notifier = Arc::new(RecordingNotifier::new());
        let service = transactional_user_service(&db, repo, notifier, standard());

        let err = service.upgrade_levels().await.unwrap_err();

        assert!(matches!(err, ServiceError::DataAccess(DataAccessError::Query(_))));
        assert_eq!(levels(&db).await, seeded_levels());
    }

    #[tokio::test]
    async fn test_policy_failure_rolls_back_whole_batch() {
        let db = seeded().await;
        let policy = Arc::new(FailingPolicy::new(standard(), "derek"));
        let service = user_service(&db, Arc::new(RecordingNotifier::new()), policy);

        let err = service.upgrade_levels().await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::InvalidState(CoreError::LevelNotAssigned { .. })
        ));
        assert_eq!(levels(&db).await, seeded_levels());
    }

    #[tokio::test]
    async fn test_add_assigns_default_level() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = user_service(&db, Arc::new(RecordingNotifier::new()), standard());

        let plain = User::new("frank", "Frank Gray", "p6", "frank@example.com");
        let golden = User::new("gina", "Gina Hale", "p7", "gina@example.com").with_level(Level::Gold);
        service.add(plain).await.unwrap();
        service.add(golden).await.unwrap();

        let repo = db.users();
        assert_eq!(repo.get("frank").await.unwrap().level, Some(Level::Basic));
        assert_eq!(repo.get("gina").await.unwrap().level, Some(Level::Gold));
    }

    #[tokio::test]
    async fn test_failed_add_leaves_no_row() {
        let db = seeded().await;
        let service = user_service(&db, Arc::new(RecordingNotifier::new()), standard());

        let err = service.add(sample_users().remove(0)).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::DataAccess(DataAccessError::DuplicateKey { .. })
        ));
        assert_eq!(db.users().count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_batches_each_get_their_own_transaction() {
        let db = seeded().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let service = user_service(&db, notifier.clone(), standard());

        let first = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.upgrade_levels().await }
        });
        let second = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.upgrade_levels().await }
        });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        // Batches are serialized; whichever runs second finds nothing left to do.
        assert_eq!(first.upgraded.len() + second.upgraded.len(), 2);
        assert_eq!(notifier.ids().await, ["brian", "derek"]);
        assert_eq!(levels(&db).await[3], ("derek".to_string(), Some(Level::Gold)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batches_on_file_database_both_succeed() {
        for round in 0..5 {
            let path = temp_db_path(&format!("app-concurrent-{round}"));
            let db = seeded_with(DbConfig::new(&path).max_connections(4)).await;
            let notifier = Arc::new(RecordingNotifier::new());
            let service = user_service(&db, notifier.clone(), standard());

            let first = tokio::spawn({
                let service = Arc::clone(&service);
                async move { service.upgrade_levels().await }
            });
            let second = tokio::spawn({
                let service = Arc::clone(&service);
                async move { service.upgrade_levels().await }
            });

            let first = first.await.unwrap();
            let second = second.await.unwrap();
            assert!(first.is_ok(), "round {round}: {first:?}");
            assert!(second.is_ok(), "round {round}: {second:?}");

            let upgraded = first.unwrap().upgraded.len() + second.unwrap().upgraded.len();
            assert_eq!(upgraded, 2);
            assert_eq!(notifier.ids().await, ["brian", "derek"]);
            assert_eq!(levels(&db).await[1], ("brian".to_string(), Some(Level::Silver)));
            assert_eq!(levels(&db).await[3], ("derek".to_string(), Some(Level::Gold)));

            db.close().await;
            remove_db_files(&path);
        }
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = user_service(&db, Arc::new(RecordingNotifier::new()), standard());

        assert_eq!(seed_sample_users(&db, service.as_ref()).await.unwrap(), 5);
        assert_eq!(seed_sample_users(&db, service.as_ref()).await.unwrap(), 0);
        assert_eq!(db.users().count().await.unwrap(), 5);
    }
}
