//! Authorization code storage trait.
//!
//! # Security Considerations
//!
//! - Never log authorization codes
//! - `consume` must be atomic: two concurrent exchanges of one code see
//!   at most one winner
//! - Not-found, expired, already-used, and wrong-client all produce the
//!   same `None` so callers have no enumeration oracle

use async_trait::async_trait;

use crate::AuthResult;
use crate::oauth::AuthorizationCode;

/// Storage trait for one-time authorization codes.
#[async_trait]
pub trait AuthCodeStorage: Send + Sync {
    /// Persists a freshly minted code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be stored.
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Atomically consumes a code for the stated client.
    ///
    /// Marks the row used and returns it only if it was pending,
    /// unexpired, and bound to `client_id`. Returning `None` is the only
    /// failure signal; callers treat every cause identically.
    ///
    /// A conditional update is the canonical implementation:
    ///
    /// ```sql
    /// UPDATE auth_codes
    /// SET consumed_at = NOW()
    /// WHERE code = $1 AND client_id = $2
    ///   AND consumed_at IS NULL AND expires_at > NOW()
    /// RETURNING *
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage operation itself fails.
    async fn consume(&self, code: &str, client_id: &str)
    -> AuthResult<Option<AuthorizationCode>>;

    /// Deletes expired rows. Size management only; reads re-verify expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
