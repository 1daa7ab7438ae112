//! Refresh token storage trait.
//!
//! # Security Considerations
//!
//! - Tokens are stored as SHA-256 hashes only
//! - Rotation is atomic: `revoke_if_active` is a conditional update, so
//!   concurrent uses of one token produce exactly one winner
//! - Revocation of a whole (user, client) family backs replay detection

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::token::RefreshToken;

/// Storage trait for refresh tokens.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a new refresh token record (hash only).
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored.
    async fn create(&self, token: &RefreshToken) -> AuthResult<()>;

    /// Finds a token record by hash, regardless of validity.
    ///
    /// Callers check `is_valid()`; a hit on a revoked row is the replay
    /// signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>>;

    /// Atomically revokes the token if it is currently active.
    ///
    /// Returns the record only if it was live (not revoked, not expired)
    /// at the moment of the update. This is the rotation primitive: of two
    /// concurrent refreshes presenting the same token, exactly one gets
    /// `Some`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_if_active(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>>;

    /// Revokes a token unconditionally. Idempotent.
    ///
    /// Returns `true` if a row existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, token_hash: &str) -> AuthResult<bool>;

    /// Revokes every token for a (user, client) pair.
    ///
    /// Used when a revoked token is replayed (replay-detection-as-signal)
    /// and when a session revocation cascades.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_family(&self, user_id: Uuid, client_id: &str) -> AuthResult<u64>;

    /// Deletes expired and long-revoked rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
