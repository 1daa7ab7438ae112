//! Device authorization storage trait.
//!
//! Device codes are stored by hash (the CLI-side secret); user codes are
//! plaintext by design, being short-lived and rate-limited. The status
//! machine is monotonic: `pending` may move to `authorized` or `denied`,
//! terminal states are absorbing.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::deviceflow::{DeviceCodeRecord, DeviceCodeStatus};

/// Storage trait for RFC 8628 device authorizations.
#[async_trait]
pub trait DeviceCodeStorage: Send + Sync {
    /// Inserts a record if its `user_code` is free among live records.
    ///
    /// Returns `false` (without inserting) when an unexpired, non-terminal
    /// record already holds the same user code; the minting engine retries
    /// with a fresh code.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn insert_if_user_code_free(&self, record: &DeviceCodeRecord) -> AuthResult<bool>;

    /// Finds a record by its plaintext user code.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_user_code(&self, user_code: &str) -> AuthResult<Option<DeviceCodeRecord>>;

    /// Finds a record by the hash of its device code.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_device_hash(
        &self,
        device_code_hash: &str,
    ) -> AuthResult<Option<DeviceCodeRecord>>;

    /// Transitions a pending record to a terminal status.
    ///
    /// Returns the updated record only if the row existed and was still
    /// `pending`; terminal states are absorbing, so a second decision
    /// returns `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn decide(
        &self,
        user_code: &str,
        status: DeviceCodeStatus,
        user_id: Option<Uuid>,
    ) -> AuthResult<Option<DeviceCodeRecord>>;

    /// Records a token-endpoint poll, returning the previous poll time.
    ///
    /// Best-effort: the engine compares the previous poll time against the
    /// advertised interval to emit `slow_down`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_polled(&self, device_code_hash: &str)
    -> AuthResult<Option<OffsetDateTime>>;

    /// Atomically removes and returns an `authorized` record.
    ///
    /// This is the exchange step: of two concurrent polls racing a freshly
    /// approved record, exactly one receives it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn take_authorized(
        &self,
        device_code_hash: &str,
    ) -> AuthResult<Option<DeviceCodeRecord>>;

    /// Deletes expired rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
