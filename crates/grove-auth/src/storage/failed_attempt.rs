//! Failed-attempt storage trait.
//!
//! Backs the magic-code lockout: the increment and the lock decision are
//! one transaction, so two concurrent misses cannot both observe
//! `threshold - 1` and skip the lock.

use async_trait::async_trait;

use crate::AuthResult;
use crate::lockout::FailedAttemptRow;

/// Storage trait for per-email failed authentication attempts.
#[async_trait]
pub trait FailedAttemptStorage: Send + Sync {
    /// Returns the current row for a (lowercased) email, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, email: &str) -> AuthResult<Option<FailedAttemptRow>>;

    /// Transactionally records a failed attempt.
    ///
    /// Increments the running count and, when the count reaches
    /// `threshold`, sets `locked_until` to now plus `lock_duration`, all
    /// in one step. Returns the row after the update.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn record_failure(
        &self,
        email: &str,
        threshold: u32,
        lock_duration: std::time::Duration,
    ) -> AuthResult<FailedAttemptRow>;

    /// Clears the row after a successful attempt. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn clear(&self, email: &str) -> AuthResult<()>;
}
