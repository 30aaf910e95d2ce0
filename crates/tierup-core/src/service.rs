//! # User Service
//!
//! Applies the upgrade policy to every stored user.
//!
//! ## Batch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         upgrade_levels()                                │
//! │                                                                         │
//! │   repository.get_all()            (id ascending)                        │
//! │        │                                                                │
//! │        ▼  for each user                                                 │
//! │   policy.evaluate(&user) ── None ──► next user                          │
//! │        │ Some(level)                                                    │
//! │        ▼                                                                │
//! │   user.promote_to(level)                                                │
//! │   repository.update(&user)                                              │
//! │   notifier.notify(&user)                                                │
//! │                                                                         │
//! │   Any Err stops the loop and is returned as is.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `UserServiceImpl` knows nothing about transactions. Wrap it in
//! [`crate::transaction::TransactionalUserService`] for all-or-nothing batches.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ServiceResult;
use crate::notification::Notifier;
use crate::policy::UpgradePolicy;
use crate::repository::UserRepository;
use crate::types::{Level, User};

// =============================================================================
// Service Contract
// =============================================================================

/// Outcome of one `upgrade_levels` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeSummary {
    /// Users looked at.
    pub examined: usize,

    /// Ids of upgraded users, in processing order.
    pub upgraded: Vec<String>,
}

/// Service contract shared by the plain service and the transaction wrapper.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Stores a new user, assigning BASIC when no level is set.
    ///
    /// ## Returns
    /// The user as stored.
    async fn add(&self, user: User) -> ServiceResult<User>;

    /// Upgrades every user the policy selects, notifying each one.
    async fn upgrade_levels(&self) -> ServiceResult<UpgradeSummary>;
}

// =============================================================================
// Implementation
// =============================================================================

/// Policy-driven upgrade service.
#[derive(Clone)]
pub struct UserServiceImpl {
    repository: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    policy: Arc<dyn UpgradePolicy>,
}

impl UserServiceImpl {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
        policy: Arc<dyn UpgradePolicy>,
    ) -> Self {
        UserServiceImpl {
            repository,
            notifier,
            policy,
        }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn add(&self, mut user: User) -> ServiceResult<User> {
        let level = *user.level.get_or_insert(Level::Basic);
        self.repository.add(&user).await?;
        debug!(id = %user.id, level = %level, "User added");
        Ok(user)
    }

    async fn upgrade_levels(&self) -> ServiceResult<UpgradeSummary> {
        let users = self.repository.get_all().await?;
        let mut summary = UpgradeSummary {
            examined: users.len(),
            upgraded: Vec::new(),
        };

        for mut user in users {
            let Some(next) = self.policy.evaluate(&user)? else {
                continue;
            };

            let from = user.require_level()?;
            user.promote_to(next)?;
            self.repository.update(&user).await?;
            self.notifier.notify(&user).await?;

            debug!(id = %user.id, from = %from, to = %next, "User upgraded");
            summary.upgraded.push(user.id);
        }

        info!(
            examined = summary.examined,
            upgraded = summary.upgraded.len(),
            "Level upgrade batch finished"
        );
        Ok(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
