//! # Domain Types
//!
//! Core domain types used throughout tierup.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐          ┌─────────────────┐                      │
//! │  │      User       │          │      Level      │                      │
//! │  │  ─────────────  │          │  ─────────────  │                      │
//! │  │  id (unique)    │   level  │  Basic  = 1     │                      │
//! │  │  name           │ ───────► │  Silver = 2     │                      │
//! │  │  password       │          │  Gold   = 3     │                      │
//! │  │  email          │          │                 │                      │
//! │  │  login          │          │  Basic < Silver │                      │
//! │  │  recommend      │          │        < Gold   │                      │
//! │  └─────────────────┘          └─────────────────┘                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Level Lifecycle
//! A level only ever moves up. `level` is `None` only between construction
//! and the first `add`; every persisted user carries one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Level
// =============================================================================

/// A user's tier.
///
/// Ordering follows the declaration order, so `Level::Basic < Level::Gold`.
///
/// ## Storage
/// Persisted as a small integer: 1 = BASIC, 2 = SILVER, 3 = GOLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Basic,
    Silver,
    Gold,
}

impl Level {
    /// Integer value stored in the `level` column.
    #[inline]
    pub const fn value(self) -> i64 {
        match self {
            Level::Basic => 1,
            Level::Silver => 2,
            Level::Gold => 3,
        }
    }

    /// Parses a stored integer.
    ///
    /// ## Returns
    /// - `Ok(Level)` for 1, 2 or 3
    /// - `Err(CoreError::UnknownLevel)` for anything else
    pub fn from_value(value: i64) -> CoreResult<Self> {
        match value {
            1 => Ok(Level::Basic),
            2 => Ok(Level::Silver),
            3 => Ok(Level::Gold),
            other => Err(CoreError::UnknownLevel(other)),
        }
    }

    /// The level directly above this one; `None` for GOLD.
    #[inline]
    pub const fn next(self) -> Option<Level> {
        match self {
            Level::Basic => Some(Level::Silver),
            Level::Silver => Some(Level::Gold),
            Level::Gold => None,
        }
    }

    /// Upper-case name, as shown in notices and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Basic => "BASIC",
            Level::Silver => "SILVER",
            Level::Gold => "GOLD",
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Basic
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for Level {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Level::from_value(value)
    }
}

// =============================================================================
// User
// =============================================================================

/// A user record.
///
/// Identity is `id`; every other field is replaced wholesale by `update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier chosen by the caller.
    pub id: String,

    /// Display name.
    pub name: String,

    pub password: String,

    /// Address upgrade notices are sent to.
    pub email: String,

    /// Current tier. `None` until assigned (see `UserService::add`).
    pub level: Option<Level>,

    /// Number of logins.
    pub login: u32,

    /// Number of recommendations received.
    pub recommend: u32,
}

impl User {
    /// Creates a user with no level and zero counters.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let user = User::new("anna", "Anna Berg", "p1", "anna@example.com")
    ///     .with_level(Level::Basic)
    ///     .with_login(49);
    /// ```
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        User {
            id: id.into(),
            name: name.into(),
            password: password.into(),
            email: email.into(),
            level: None,
            login: 0,
            recommend: 0,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_login(mut self, login: u32) -> Self {
        self.login = login;
        self
    }

    pub fn with_recommend(mut self, recommend: u32) -> Self {
        self.recommend = recommend;
        self
    }

    /// Returns the assigned level or `LevelNotAssigned`.
    pub fn require_level(&self) -> CoreResult<Level> {
        self.level.ok_or_else(|| CoreError::LevelNotAssigned {
            id: self.id.clone(),
        })
    }

    /// Moves the user to the next level.
    ///
    /// ## Returns
    /// - `Ok(level)` with the new level
    /// - `Err(LevelNotAssigned)` if no level is set
    /// - `Err(NoNextLevel)` if already GOLD
    pub fn upgrade_level(&mut self) -> CoreResult<Level> {
        let current = self.require_level()?;
        let next = current.next().ok_or_else(|| CoreError::NoNextLevel {
            id: self.id.clone(),
            level: current,
        })?;
        self.level = Some(next);
        Ok(next)
    }

    /// Moves the user to an explicit level strictly above the current one.
    pub fn promote_to(&mut self, target: Level) -> CoreResult<()> {
        let current = self.require_level()?;
        if target <= current {
            return Err(CoreError::NotAnUpgrade {
                id: self.id.clone(),
                from: current,
                to: target,
            });
        }
        self.level = Some(target);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
