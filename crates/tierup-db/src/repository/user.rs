//! # User Repository
//!
//! SQLite implementation of `tierup_core::UserRepository`.
//!
//! ## Row Mapping
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────────────────────┐
//! │ column       │ SQLite type  │ User field                               │
//! ├──────────────┼──────────────┼──────────────────────────────────────────┤
//! │ id           │ TEXT PK      │ id                                       │
//! │ name         │ TEXT         │ name                                     │
//! │ password     │ TEXT         │ password                                 │
//! │ email        │ TEXT         │ email                                    │
//! │ level        │ INTEGER      │ level (1/2/3, else InvalidState)         │
//! │ login        │ INTEGER      │ login                                    │
//! │ recommend    │ INTEGER      │ recommend                                │
//! └──────────────┴──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Every method is one `StatementExecutor::execute` call, so it runs inside
//! the transaction bound to the calling task when there is one.

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use tierup_core::{DataAccessError, DataAccessResult, Level, User, UserRepository};

use crate::executor::StatementExecutor;

const SELECT_USER_BY_ID: &str =
    "SELECT id, name, password, email, level, login, recommend FROM users WHERE id = ?1";

const SELECT_ALL_USERS: &str =
    "SELECT id, name, password, email, level, login, recommend FROM users ORDER BY id";

// =============================================================================
// Row Record
// =============================================================================

/// Raw `users` row.
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: String,
    name: String,
    password: String,
    email: String,
    level: i64,
    login: i64,
    recommend: i64,
}

impl UserRecord {
    /// Builds a `User`, rejecting the whole row if any column is out of range.
    fn into_user(self) -> DataAccessResult<User> {
        let level = Level::from_value(self.level)?;
        let login = counter(&self.id, "login", self.login)?;
        let recommend = counter(&self.id, "recommend", self.recommend)?;

        Ok(User {
            id: self.id,
            name: self.name,
            password: self.password,
            email: self.email,
            level: Some(level),
            login,
            recommend,
        })
    }
}

fn counter(id: &str, column: &str, value: i64) -> DataAccessResult<u32> {
    u32::try_from(value).map_err(|_| {
        DataAccessError::Query(format!("{column} out of range for user {id}: {value}"))
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = SqliteUserRepository::new(pool);
///
/// repo.add(&user).await?;
/// let stored = repo.get("anna").await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    executor: StatementExecutor,
}

impl SqliteUserRepository {
    /// Creates a new SqliteUserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SqliteUserRepository {
            executor: StatementExecutor::new(pool),
        }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    /// Inserts one row with every column.
    ///
    /// ## Returns
    /// * `Err(DuplicateKey)` - id already exists
    /// * `Err(InvalidState)` - user has no level
    async fn add(&self, user: &User) -> DataAccessResult<()> {
        let level = user.require_level()?;
        let user = user.clone();

        self.executor
            .execute("add", move |conn| {
                Box::pin(async move {
                    sqlx::query(
                        r#"
                        INSERT INTO users (id, name, password, email, level, login, recommend)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                        "#,
                    )
                    .bind(user.id)
                    .bind(user.name)
                    .bind(user.password)
                    .bind(user.email)
                    .bind(level.value())
                    .bind(i64::from(user.login))
                    .bind(i64::from(user.recommend))
                    .execute(&mut *conn)
                    .await
                })
            })
            .await?;
        Ok(())
    }

    /// Gets a user by id.
    ///
    /// ## Returns
    /// * `Err(NotFound)` - no row
    /// * `Err(IncorrectResultSize)` - more than one row
    /// * `Err(InvalidState)` - stored level is not 1, 2 or 3
    async fn get(&self, id: &str) -> DataAccessResult<User> {
        let key = id.to_string();
        let mut records = self
            .executor
            .execute("get", move |conn| {
                Box::pin(async move {
                    sqlx::query_as::<_, UserRecord>(SELECT_USER_BY_ID)
                        .bind(key)
                        .fetch_all(&mut *conn)
                        .await
                })
            })
            .await?;

        match records.len() {
            0 => Err(DataAccessError::not_found("User", id)),
            1 => records.remove(0).into_user(),
            actual => Err(DataAccessError::IncorrectResultSize {
                expected: 1,
                actual,
            }),
        }
    }

    /// Rewrites every column of the row with the user's id.
    ///
    /// An unknown id matches no row and is not an error.
    async fn update(&self, user: &User) -> DataAccessResult<()> {
        let level = user.require_level()?;
        let id = user.id.clone();
        let user = user.clone();

        let affected = self
            .executor
            .execute("update", move |conn| {
                Box::pin(async move {
                    sqlx::query(
                        r#"
                        UPDATE users
                        SET name = ?2, password = ?3, email = ?4,
                            level = ?5, login = ?6, recommend = ?7
                        WHERE id = ?1
                        "#,
                    )
                    .bind(user.id)
                    .bind(user.name)
                    .bind(user.password)
                    .bind(user.email)
                    .bind(level.value())
                    .bind(i64::from(user.login))
                    .bind(i64::from(user.recommend))
                    .execute(&mut *conn)
                    .await
                    .map(|done| done.rows_affected())
                })
            })
            .await?;

        if affected == 0 {
            debug!(id = %id, "Update matched no user");
        }
        Ok(())
    }

    /// All users ordered by id.
    async fn get_all(&self) -> DataAccessResult<Vec<User>> {
        let records = self
            .executor
            .execute("get_all", |conn| {
                Box::pin(async move {
                    sqlx::query_as::<_, UserRecord>(SELECT_ALL_USERS)
                        .fetch_all(&mut *conn)
                        .await
                })
            })
            .await?;

        records.into_iter().map(UserRecord::into_user).collect()
    }

    async fn delete_all(&self) -> DataAccessResult<()> {
        let deleted = self.executor.execute_sql("delete_all", "DELETE FROM users").await?;
        debug!(deleted, "Deleted all users");
        Ok(())
    }

    async fn count(&self) -> DataAccessResult<u64> {
        let count = self
            .executor
            .execute("count", |conn| {
                Box::pin(async move {
                    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                        .fetch_one(&mut *conn)
                        .await
                })
            })
            .await?;

        Ok(count as u64)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
