//! User and allowlist storage traits.
//!
//! The population is allowlist-governed: unless global public signup is
//! enabled, an email that is not on the allowlist cannot authenticate at
//! any ceremony. Membership checks happen at authentication time *and* at
//! device-approval time, so a lapsed membership takes effect immediately.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::User;

/// Storage operations for end-users.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Finds a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    /// Finds a user by lowercased email.
    ///
    /// Implementations must compare case-folded; callers lowercase at the
    /// boundary as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Creates the user on first authentication, or refreshes the profile
    /// (name, avatar, last-login) of an existing record with the same
    /// email.
    ///
    /// Returns the stored record either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert(&self, user: User) -> AuthResult<User>;
}

/// Storage operations for the email allowlist.
#[async_trait]
pub trait AllowlistStorage: Send + Sync {
    /// Returns `true` if the (lowercased) email may authenticate.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn contains(&self, email: &str) -> AuthResult<bool>;

    /// Adds an email. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn add(&self, email: &str) -> AuthResult<()>;

    /// Removes an email. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove(&self, email: &str) -> AuthResult<()>;
}
