//! In-memory refresh token storage.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use grove_auth::AuthResult;
use grove_auth::storage::RefreshTokenStorage;
use grove_auth::token::RefreshToken;

/// Refresh tokens keyed by token hash.
#[derive(Default)]
pub struct MemoryRefreshTokenStorage {
    tokens: RwLock<HashMap<String, RefreshToken>>,
}

impl MemoryRefreshTokenStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStorage for MemoryRefreshTokenStorage {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        self.tokens
            .write()
            .await
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.tokens.read().await.get(token_hash).cloned())
    }

    async fn revoke_if_active(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        let mut tokens = self.tokens.write().await;
        let Some(record) = tokens.get_mut(token_hash) else {
            return Ok(None);
        };
        if !record.is_valid() {
            return Ok(None);
        }
        record.revoked_at = Some(OffsetDateTime::now_utc());
        Ok(Some(record.clone()))
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(token_hash) {
            Some(record) => {
                record.revoked_at.get_or_insert(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_family(&self, user_id: Uuid, client_id: &str) -> AuthResult<u64> {
        let mut tokens = self.tokens.write().await;
        let mut revoked = 0;
        for record in tokens.values_mut() {
            if record.user_id == user_id && record.client_id == client_id && !record.is_revoked()
            {
                record.revoked_at = Some(OffsetDateTime::now_utc());
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired());
        Ok((before - tokens.len()) as u64)
    }
}
