//! # Repository Module
//!
//! SQLite implementations of the `tierup-core` repository contracts.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UserServiceImpl                                                       │
//! │       │  Arc<dyn UserRepository>                                       │
//! │       ▼                                                                 │
//! │  SqliteUserRepository                                                  │
//! │  ├── add / get / update                                                │
//! │  ├── get_all / delete_all / count                                      │
//! │       │  one unit of work per call                                     │
//! │       ▼                                                                 │
//! │  StatementExecutor → ResourceHandle (pooled or bound transaction)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SqliteUserRepository`](user::SqliteUserRepository) - users table

pub mod user;
