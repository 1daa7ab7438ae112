//! Federated-ceremony state storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::oauth::OAuthState;

/// Storage trait for pending federated sign-ins.
#[async_trait]
pub trait OAuthStateStorage: Send + Sync {
    /// Persists a pending ceremony.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be stored.
    async fn create(&self, state: &OAuthState) -> AuthResult<()>;

    /// Atomically fetches and deletes a pending ceremony.
    ///
    /// A state token can therefore be consumed at most once; replay finds
    /// nothing. Expired rows are not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume(&self, state: &str) -> AuthResult<Option<OAuthState>>;

    /// Deletes expired rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
