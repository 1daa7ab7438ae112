//! Failed-attempt lockout policy.
//!
//! Five consecutive failed magic-code verifications within the lockout
//! horizon lock the account for fifteen minutes; one successful
//! verification clears the row. The increment-and-maybe-lock step is a
//! single transaction in [`crate::storage::FailedAttemptStorage`].

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Per-email failed attempt state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAttemptRow {
    /// Lowercased email.
    pub email: String,

    /// Running count of consecutive failures.
    pub count: u32,

    /// When the most recent failure happened.
    #[serde(with = "time::serde::rfc3339")]
    pub last_attempt_at: OffsetDateTime,

    /// When the lock expires; `None` while unlocked.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub locked_until: Option<OffsetDateTime>,
}

impl FailedAttemptRow {
    /// Creates a row for a first failure.
    #[must_use]
    pub fn first_failure(email: &str) -> Self {
        Self {
            email: email.to_lowercase(),
            count: 1,
            last_attempt_at: OffsetDateTime::now_utc(),
            locked_until: None,
        }
    }

    /// Returns `true` if the account is currently locked.
    ///
    /// A lock whose timestamp has passed no longer counts; reads re-verify
    /// rather than trusting cleanup.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked_until
            .map(|until| OffsetDateTime::now_utc() < until)
            .unwrap_or(false)
    }
}
