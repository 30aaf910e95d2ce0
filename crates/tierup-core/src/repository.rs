//! # Repository Contract
//!
//! Persistence boundary for users. The core only sees this trait; the SQLite
//! implementation lives in `tierup-db` and in-memory doubles live in
//! [`crate::testing`].
//!
//! ## Operations
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────────────────┐
//! │ add          │ insert one row; DuplicateKey if id exists                │
//! │ get          │ NotFound (0 rows), IncorrectResultSize (>1 rows)         │
//! │ update       │ rewrite every column by id; unknown id is a no-op        │
//! │ get_all      │ all users, id ascending                                  │
//! │ delete_all   │ remove everything; idempotent                            │
//! │ count        │ number of rows                                           │
//! └──────────────┴──────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::DataAccessResult;
use crate::types::User;

/// User persistence contract.
///
/// Implementations must be shareable across tasks (`Arc<dyn UserRepository>`)
/// and must never swallow errors.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user. The user must already carry a level.
    async fn add(&self, user: &User) -> DataAccessResult<()>;

    /// Fetches a user by id.
    async fn get(&self, id: &str) -> DataAccessResult<User>;

    /// Replaces every field of the user with the same id.
    async fn update(&self, user: &User) -> DataAccessResult<()>;

    /// All users ordered by id ascending.
    async fn get_all(&self) -> DataAccessResult<Vec<User>>;

    async fn delete_all(&self) -> DataAccessResult<()>;

    async fn count(&self) -> DataAccessResult<u64>;
}
