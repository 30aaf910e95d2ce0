//! # tierup-db: Database Layer for tierup
//!
//! SQLite persistence for users, the statement executor that owns connection
//! lifecycle, and the transaction manager behind `TransactionalUserService`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        tierup Data Flow                                 │
//! │                                                                         │
//! │  upgrade-levels binary / TransactionalUserService                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tierup-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repository   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │   (user.rs)   │    │  (embedded)  │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │                    ▼                               │   │
//! │  │           │            ┌───────────────┐    ┌──────────────┐  │   │
//! │  │           └───────────►│   Executor    │◄───│ Transaction  │  │   │
//! │  │                        │ ResourceHandle│    │   Manager    │  │   │
//! │  │                        └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (tierup.db)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`executor`] - Resource handle and statement executor
//! - [`repository`] - `SqliteUserRepository`
//! - [`transaction`] - `SqliteTransactionManager`
//! - [`app`] - Service wiring
//! - [`config`] - Environment configuration
//! - [`error`] - Set-up errors and sqlx error translation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tierup_core::{LoggingNotifier, StandardUpgradePolicy};
//! use tierup_db::{app, Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./tierup.db")).await?;
//! let service = app::user_service(
//!     &db,
//!     Arc::new(LoggingNotifier::new()),
//!     Arc::new(StandardUpgradePolicy::new()),
//! );
//!
//! let summary = service.upgrade_levels().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod app;
pub mod config;
pub mod error;
pub mod executor;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod transaction;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{translate, DbError, DbResult};
pub use executor::{ResourceHandle, StatementExecutor};
pub use pool::{Database, DbConfig};
pub use repository::user::SqliteUserRepository;
pub use transaction::SqliteTransactionManager;
