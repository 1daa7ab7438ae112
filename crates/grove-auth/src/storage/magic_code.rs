//! Magic code storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::magic::MagicCode;

/// Storage trait for single-use emailed magic codes.
#[async_trait]
pub trait MagicCodeStorage: Send + Sync {
    /// Persists a freshly generated code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be stored.
    async fn create(&self, code: &MagicCode) -> AuthResult<()>;

    /// Atomically consumes `(email, code)`.
    ///
    /// Marks the row used and returns it only if it matched the lowercased
    /// email, was unused, and was unexpired. `None` covers every failure
    /// cause.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume(&self, email: &str, code: &str) -> AuthResult<Option<MagicCode>>;

    /// Deletes expired rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
