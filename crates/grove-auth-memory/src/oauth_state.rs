//! In-memory federated-ceremony state storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use grove_auth::AuthResult;
use grove_auth::oauth::OAuthState;
use grove_auth::storage::OAuthStateStorage;

/// Pending ceremonies keyed by the internal state token.
#[derive(Default)]
pub struct MemoryOAuthStateStorage {
    states: RwLock<HashMap<String, OAuthState>>,
}

impl MemoryOAuthStateStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OAuthStateStorage for MemoryOAuthStateStorage {
    async fn create(&self, state: &OAuthState) -> AuthResult<()> {
        self.states
            .write()
            .await
            .insert(state.state.clone(), state.clone());
        Ok(())
    }

    async fn consume(&self, state: &str) -> AuthResult<Option<OAuthState>> {
        // Remove first: a replay must find nothing even if this row
        // turns out to be expired.
        let row = self.states.write().await.remove(state);
        Ok(row.filter(|s| !s.is_expired()))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, s| !s.is_expired());
        Ok((before - states.len()) as u64)
    }
}
