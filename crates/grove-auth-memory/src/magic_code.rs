//! In-memory magic code storage.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use grove_auth::AuthResult;
use grove_auth::magic::MagicCode;
use grove_auth::storage::MagicCodeStorage;

/// Magic codes, append-ordered.
///
/// A vector keeps replaced codes around until the sweep; `consume` only
/// matches unused, unexpired rows, so stale entries are harmless.
#[derive(Default)]
pub struct MemoryMagicCodeStorage {
    codes: RwLock<Vec<MagicCode>>,
}

impl MemoryMagicCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MagicCodeStorage for MemoryMagicCodeStorage {
    async fn create(&self, code: &MagicCode) -> AuthResult<()> {
        self.codes.write().await.push(code.clone());
        Ok(())
    }

    async fn consume(&self, email: &str, code: &str) -> AuthResult<Option<MagicCode>> {
        let email = email.to_lowercase();
        let mut codes = self.codes.write().await;
        let found = codes
            .iter_mut()
            .find(|c| c.email == email && c.code == code && c.is_valid());
        Ok(found.map(|c| {
            c.used_at = Some(OffsetDateTime::now_utc());
            c.clone()
        }))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|c| !c.is_expired());
        Ok((before - codes.len()) as u64)
    }
}
