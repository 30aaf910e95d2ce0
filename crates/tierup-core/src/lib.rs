//! # tierup-core: Pure Business Logic for tierup
//!
//! Domain types, the level-upgrade policy, the upgrade service and the
//! transaction boundary. Persistence, notification delivery and transaction
//! mechanics are traits; this crate performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        tierup Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              upgrade-levels binary (tierup-db)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Arc<dyn UserService>                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tierup-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐  ┌───────────┐  ┌────────────┐  ┌─────────┐  │   │
//! │  │   │ transaction │─►│  service  │─►│   policy   │  │  types  │  │   │
//! │  │   │  boundary   │  │           │─►│ repository │  │  User   │  │   │
//! │  │   │             │  │           │─►│ notifier   │  │  Level  │  │   │
//! │  │   └─────────────┘  └───────────┘  └────────────┘  └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO MAIL • TRAITS AT EVERY SEAM         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tierup-db (Database Layer)                   │   │
//! │  │      SqliteUserRepository, SqliteTransactionManager, config     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `User` and `Level`
//! - [`policy`] - upgrade rules
//! - [`repository`] - persistence contract
//! - [`notification`] - notifier contract and upgrade notice
//! - [`service`] - `UserService` and its policy-driven implementation
//! - [`transaction`] - transaction manager contract and the decorator
//! - [`testing`] - in-memory doubles
//! - [`error`] - error types
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tierup_core::service::{UserService, UserServiceImpl};
//! use tierup_core::testing::{sample_users, InMemoryUserRepository, RecordingNotifier};
//! use tierup_core::StandardUpgradePolicy;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let repo = Arc::new(InMemoryUserRepository::with_users(sample_users()));
//! let notifier = Arc::new(RecordingNotifier::new());
//! let service = UserServiceImpl::new(repo, notifier.clone(), Arc::new(StandardUpgradePolicy::new()));
//!
//! let summary = service.upgrade_levels().await.unwrap();
//! assert_eq!(summary.upgraded, ["brian", "derek"]);
//! # });
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod notification;
pub mod policy;
pub mod repository;
pub mod service;
pub mod testing;
pub mod transaction;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{
    CoreError, CoreResult, DataAccessError, DataAccessResult, NotificationError,
    NotificationResult, ServiceError, ServiceResult,
};
pub use notification::{LoggingNotifier, Notifier, UpgradeNotice};
pub use policy::{StandardUpgradePolicy, UpgradePolicy, UpgradeThresholds};
pub use repository::UserRepository;
pub use service::{UpgradeSummary, UserService, UserServiceImpl};
pub use transaction::{TransactionManager, TransactionStatus, TransactionalUserService};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Logins a BASIC user needs before being upgraded to SILVER.
pub const MIN_LOGIN_FOR_SILVER: u32 = 50;

/// Recommendations a SILVER user needs before being upgraded to GOLD.
pub const MIN_RECOMMEND_FOR_GOLD: u32 = 30;
