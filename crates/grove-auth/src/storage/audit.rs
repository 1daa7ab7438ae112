//! Audit storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::audit::AuditEntry;

/// Append-only storage for audit entries.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Appends an entry. There is no update or delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be stored. Callers emit
    /// fire-and-forget, so this error never fails an originating request.
    async fn append(&self, entry: &AuditEntry) -> AuthResult<()>;

    /// Returns the most recent entries, newest first, for admin reporting.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn recent(&self, limit: usize) -> AuthResult<Vec<AuditEntry>>;
}
