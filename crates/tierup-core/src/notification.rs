//! # Notification Port
//!
//! Tells an upgraded user about the new level.
//!
//! ```text
//!   UserServiceImpl ──notify(&User)──► dyn Notifier
//!                                        ├── LoggingNotifier   (renders + logs)
//!                                        ├── NoopNotifier      (testing)
//!                                        └── RecordingNotifier (testing)
//! ```
//!
//! A failed notification aborts the batch exactly like a failed update.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{NotificationError, NotificationResult};
use crate::types::User;

/// Subject line of every upgrade notice.
pub const UPGRADE_SUBJECT: &str = "Upgrade notice";

// =============================================================================
// Notifier Contract
// =============================================================================

/// Delivery boundary for upgrade notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifies `user` that its level changed. `user.level` is the new level.
    async fn notify(&self, user: &User) -> NotificationResult<()>;
}

// =============================================================================
// Upgrade Notice
// =============================================================================

/// A rendered upgrade notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeNotice {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl UpgradeNotice {
    /// Renders the notice for an upgraded user.
    ///
    /// ## Returns
    /// - `Err(MissingRecipient)` if the email is blank
    /// - `Err(InvalidState)` if the user has no level to announce
    pub fn for_user(user: &User) -> NotificationResult<Self> {
        let to = user.email.trim();
        if to.is_empty() {
            return Err(NotificationError::MissingRecipient {
                id: user.id.clone(),
            });
        }

        let level = user.require_level()?;

        Ok(UpgradeNotice {
            to: to.to_string(),
            subject: UPGRADE_SUBJECT.to_string(),
            body: format!("Your level has been upgraded to {}.", level),
        })
    }
}

// =============================================================================
// Logging Notifier
// =============================================================================

/// Renders the notice and writes it to the log instead of a mail transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    pub fn new() -> Self {
        LoggingNotifier
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, user: &User) -> NotificationResult<()> {
        let notice = UpgradeNotice::for_user(user)?;
        info!(
            id = %user.id,
            to = %notice.to,
            subject = %notice.subject,
            "{}",
            notice.body
        );
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::Level;

    #[test]
    fn test_notice_rendering() {
        let user = User::new("derek", "Derek Ford", "p4", "derek@example.com").with_level(Level::Gold);
        let notice = UpgradeNotice::for_user(&user).unwrap();
        assert_eq!(notice.to, "derek@example.com");
        assert_eq!(notice.subject, "Upgrade notice");
        assert_eq!(notice.body, "Your level has been upgraded to GOLD.");
    }

    #[test]
    fn test_notice_requires_recipient() {
        let user = User::new("derek", "Derek Ford", "p4", "  ").with_level(Level::Silver);
        assert!(matches!(
            UpgradeNotice::for_user(&user),
            Err(NotificationError::MissingRecipient { .. })
        ));
    }

    #[test]
    fn test_notice_without_level_is_invalid_state() {
        let user = User::new("frank", "Frank Gray", "p6", "frank@example.com");
        assert!(matches!(
            UpgradeNotice::for_user(&user),
            Err(NotificationError::InvalidState(CoreError::LevelNotAssigned { .. }))
        ));
    }

    #[tokio::test]
    async fn test_logging_notifier_propagates_missing_recipient() {
        let user = User::new("derek", "Derek Ford", "p4", "").with_level(Level::Silver);
        assert!(LoggingNotifier::new().notify(&user).await.is_err());

        let user = User::new("derek", "Derek Ford", "p4", "derek@example.com").with_level(Level::Silver);
        assert!(LoggingNotifier::new().notify(&user).await.is_ok());
    }
}
