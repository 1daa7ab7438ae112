//! In-memory client storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use grove_auth::AuthResult;
use grove_auth::error::AuthError;
use grove_auth::storage::ClientStorage;
use grove_auth::types::Client;

/// Client registrations in a mutex-guarded map.
#[derive(Default)]
pub struct MemoryClientStorage {
    clients: RwLock<HashMap<String, Client>>,
}

impl MemoryClientStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStorage for MemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }

    async fn find_by_origin(&self, origin: &str) -> AuthResult<Option<Client>> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .find(|c| c.is_origin_allowed(origin))
            .cloned())
    }

    async fn create(&self, client: &Client) -> AuthResult<()> {
        client
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.client_id) {
            return Err(AuthError::storage(format!(
                "client {} already exists",
                client.client_id
            )));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn list(&self) -> AuthResult<Vec<Client>> {
        Ok(self.clients.read().await.values().cloned().collect())
    }
}
