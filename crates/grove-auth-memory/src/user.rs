//! In-memory user and allowlist storage.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use grove_auth::AuthResult;
use grove_auth::storage::{AllowlistStorage, UserStorage};
use grove_auth::types::User;

/// Users keyed by id, with an email index.
#[derive(Default)]
pub struct MemoryUserStorage {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn upsert(&self, user: User) -> AuthResult<User> {
        let mut users = self.users.write().await;
        let existing = users.values().find(|u| u.email == user.email).cloned();
        let stored = match existing {
            Some(mut current) => {
                current.refresh_profile(&user.name, user.avatar_url.as_deref());
                current
            }
            None => user,
        };
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

/// Lowercased emails permitted to authenticate.
#[derive(Default)]
pub struct MemoryAllowlistStorage {
    emails: RwLock<HashSet<String>>,
}

impl MemoryAllowlistStorage {
    /// Creates an empty allowlist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AllowlistStorage for MemoryAllowlistStorage {
    async fn contains(&self, email: &str) -> AuthResult<bool> {
        Ok(self.emails.read().await.contains(&email.to_lowercase()))
    }

    async fn add(&self, email: &str) -> AuthResult<()> {
        self.emails.write().await.insert(email.to_lowercase());
        Ok(())
    }

    async fn remove(&self, email: &str) -> AuthResult<()> {
        self.emails.write().await.remove(&email.to_lowercase());
        Ok(())
    }
}
