//! # Error Types
//!
//! Error taxonomy shared by every layer of tierup.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  CoreError          - invalid state (unknown level, no next level...)  │
//! │  DataAccessError    - NotFound, DuplicateKey, Resource, Query...       │
//! │  NotificationError  - notice could not be addressed or delivered       │
//! │                                                                         │
//! │  ServiceError       - what UserService callers see                     │
//! │  ├── DataAccess(DataAccessError)                                       │
//! │  ├── InvalidState(CoreError)                                           │
//! │  ├── Notification(NotificationError)                                   │
//! │  └── Transaction { stage, source: DataAccessError }                    │
//! │                                                                         │
//! │  Flow: sqlx::Error → DataAccessError → ServiceError → caller           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (user id, constraint, level)
//! 3. Lower layers translate, they never swallow
//! 4. Only the transaction boundary turns an error into a side effect (rollback)

use thiserror::Error;

use crate::types::Level;

// =============================================================================
// Core Error (invalid state)
// =============================================================================

/// Invalid-state errors raised by the domain model and the upgrade policy.
///
/// Every variant indicates a data integrity bug, never a condition a caller
/// is expected to recover from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A stored level value outside {1, 2, 3}.
    #[error("Unknown level value: {0}")]
    UnknownLevel(i64),

    /// A user reached the policy or the repository without a level.
    ///
    /// ## When This Occurs
    /// - A user built with `level: None` is evaluated before being added
    /// - A user without a level is handed straight to the repository
    #[error("User {id} has no level assigned")]
    LevelNotAssigned { id: String },

    /// Upgrade requested for a user already at the top level.
    #[error("User {id} is already {level} and cannot be upgraded")]
    NoNextLevel { id: String, level: Level },

    /// Target level is not above the current one.
    #[error("User {id} cannot move from {from} to {to}")]
    NotAnUpgrade { id: String, from: Level, to: Level },
}

// =============================================================================
// Data Access Error
// =============================================================================

/// Repository errors.
///
/// Storage-specific failures are translated into these variants at a single
/// point in the database layer; nothing above it sees driver errors.
#[derive(Debug, Error)]
pub enum DataAccessError {
    /// No row matched.
    ///
    /// ## When This Occurs
    /// - `get(id)` for an id that was never added
    /// - `get(id)` after `delete_all()`
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (id already exists).
    #[error("Duplicate key violates {constraint}")]
    DuplicateKey { constraint: String },

    /// A single-row query matched more than one row.
    #[error("Incorrect result size: expected {expected}, actual {actual}")]
    IncorrectResultSize { expected: usize, actual: usize },

    /// Connection could not be acquired or released.
    ///
    /// ## When This Occurs
    /// - Pool acquire timeout (all connections busy)
    /// - Pool closed
    /// - Database file unreachable
    #[error("Resource error: {0}")]
    Resource(String),

    /// Any other statement failure.
    #[error("Query failed: {0}")]
    Query(String),

    /// A row that cannot be turned into a valid entity.
    #[error("Invalid persisted state: {0}")]
    InvalidState(#[from] CoreError),

    /// Operation deliberately left unimplemented by a test double.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

impl DataAccessError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DataAccessError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a DuplicateKey error.
    pub fn duplicate(constraint: impl Into<String>) -> Self {
        DataAccessError::DuplicateKey {
            constraint: constraint.into(),
        }
    }

    /// Returns true for the duplicate-key case, so callers can skip instead of abort.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, DataAccessError::DuplicateKey { .. })
    }
}

// =============================================================================
// Notification Error
// =============================================================================

/// Failures of the notification boundary.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The user has no address to send the notice to.
    #[error("User {id} has no e-mail address")]
    MissingRecipient { id: String },

    /// The user cannot be announced (no level assigned).
    #[error("Cannot render notice: {0}")]
    InvalidState(#[from] CoreError),

    /// The transport refused or lost the notice.
    #[error("Failed to deliver notice to {to}: {reason}")]
    Delivery { to: String, reason: String },
}

// =============================================================================
// Service Error
// =============================================================================

/// Errors surfaced by `UserService` implementations.
///
/// The transaction boundary re-raises these unchanged after rolling back.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error("Invalid state: {0}")]
    InvalidState(#[from] CoreError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    /// Begin or commit failed. Rollback failures are logged instead.
    #[error("Transaction {stage} failed: {source}")]
    Transaction {
        stage: &'static str,
        #[source]
        source: DataAccessError,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for repository operations.
pub type DataAccessResult<T> = Result<T, DataAccessError>;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

impl ServiceError {
    /// Wraps a begin/commit failure of the transaction manager.
    pub fn transaction(stage: &'static str, source: DataAccessError) -> Self {
        ServiceError::Transaction { stage, source }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Unit Tests
// =============================================================================
