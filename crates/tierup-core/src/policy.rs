//! # Upgrade Policy
//!
//! Decides whether a user moves up a level.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Level Upgrade Rules                                │
//! │                                                                         │
//! │   current    condition                          next                    │
//! │   ───────    ─────────────────────────────────  ──────                  │
//! │   BASIC      login     >= MIN_LOGIN_FOR_SILVER  SILVER                  │
//! │   SILVER     recommend >= MIN_RECOMMEND_FOR_GOLD GOLD                   │
//! │   GOLD       (never)                            -                       │
//! │   (none)     InvalidState                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The policy is pure: no I/O, no mutation, same input same output.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::types::{Level, User};
use crate::{MIN_LOGIN_FOR_SILVER, MIN_RECOMMEND_FOR_GOLD};

// =============================================================================
// Policy Contract
// =============================================================================

/// Decision function mapping a user to the level it should be upgraded to.
pub trait UpgradePolicy: Send + Sync {
    /// ## Returns
    /// - `Ok(Some(level))` when the user qualifies for `level`
    /// - `Ok(None)` when nothing changes
    /// - `Err(CoreError::LevelNotAssigned)` when the user has no level
    fn evaluate(&self, user: &User) -> CoreResult<Option<Level>>;
}

// =============================================================================
// Thresholds
// =============================================================================

/// Numeric thresholds used by [`StandardUpgradePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeThresholds {
    /// Logins a BASIC user needs to become SILVER.
    pub min_login_for_silver: u32,

    /// Recommendations a SILVER user needs to become GOLD.
    pub min_recommend_for_gold: u32,
}

impl Default for UpgradeThresholds {
    fn default() -> Self {
        UpgradeThresholds {
            min_login_for_silver: MIN_LOGIN_FOR_SILVER,
            min_recommend_for_gold: MIN_RECOMMEND_FOR_GOLD,
        }
    }
}

// =============================================================================
// Standard Policy
// =============================================================================

/// The login/recommendation based policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardUpgradePolicy {
    thresholds: UpgradeThresholds,
}

impl StandardUpgradePolicy {
    /// Policy with the default thresholds (50 logins, 30 recommendations).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: UpgradeThresholds) -> Self {
        StandardUpgradePolicy { thresholds }
    }

    pub fn thresholds(&self) -> UpgradeThresholds {
        self.thresholds
    }
}

impl UpgradePolicy for StandardUpgradePolicy {
    fn evaluate(&self, user: &User) -> CoreResult<Option<Level>> {
        let next = match user.require_level()? {
            Level::Basic if user.login >= self.thresholds.min_login_for_silver => {
                Some(Level::Silver)
            }
            Level::Silver if user.recommend >= self.thresholds.min_recommend_for_gold => {
                Some(Level::Gold)
            }
            Level::Basic | Level::Silver | Level::Gold => None,
        };
        Ok(next)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
