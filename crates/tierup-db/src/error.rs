//! # Database Error Types
//!
//! Set-up errors of the database layer, and the single translation point
//! from `sqlx::Error` into the data-access taxonomy of `tierup-core`.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  translate() (this module)  ← the only place sqlx errors are read       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DataAccessError (tierup-core)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError → TransactionalUserService rolls back → caller           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use tierup_core::DataAccessError;

/// Database set-up errors (opening the pool, migrating).
///
/// These never occur inside a repository call; those return
/// `DataAccessError`.
#[derive(Debug, Error)]
pub enum DbError {
    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    ///
    /// ## When This Occurs
    /// - Invalid SQL in migration
    /// - Migration version conflict
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A statement issued during set-up failed.
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

/// Translates a sqlx error into the data-access taxonomy.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound             → NotFound
/// sqlx::Error::Database (UNIQUE)       → DuplicateKey { constraint }
/// sqlx::Error::Database (BUSY/LOCKED)  → Resource
/// sqlx::Error::Database (other)        → Query
/// PoolTimedOut / PoolClosed / Io       → Resource
/// Tls / Protocol / WorkerCrashed       → Resource
/// Other                                → Query
/// ```
pub fn translate(err: sqlx::Error) -> DataAccessError {
    match err {
        sqlx::Error::RowNotFound => DataAccessError::not_found("Record", "unknown"),

        sqlx::Error::Database(db_err) => {
            let msg = db_err.message();

            // SQLite reports "UNIQUE constraint failed: <table>.<column>"
            if db_err.is_unique_violation() || msg.contains("UNIQUE constraint failed") {
                let constraint = msg
                    .split("constraint failed: ")
                    .nth(1)
                    .unwrap_or("unknown")
                    .to_string();
                DataAccessError::duplicate(constraint)
            } else if is_lock_contention(db_err.code().as_deref()) {
                DataAccessError::Resource(msg.to_string())
            } else {
                DataAccessError::Query(msg.to_string())
            }
        }

        sqlx::Error::PoolTimedOut => {
            DataAccessError::Resource("Timed out acquiring a connection".to_string())
        }

        sqlx::Error::PoolClosed => DataAccessError::Resource("Pool is closed".to_string()),

        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => DataAccessError::Resource(err.to_string()),

        _ => DataAccessError::Query(err.to_string()),
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_lock_contention(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6))
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::DataAccess(translate(err))
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database set-up operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
