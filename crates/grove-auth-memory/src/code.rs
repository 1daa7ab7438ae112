//! In-memory authorization code storage.
//!
//! `consume` holds the write lock across the check-and-mark step, which
//! is what makes two concurrent exchanges of one code see exactly one
//! winner.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use grove_auth::AuthResult;
use grove_auth::oauth::AuthorizationCode;
use grove_auth::storage::AuthCodeStorage;

/// Authorization codes keyed by the code value.
#[derive(Default)]
pub struct MemoryAuthCodeStorage {
    codes: RwLock<HashMap<String, AuthorizationCode>>,
}

impl MemoryAuthCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthCodeStorage for MemoryAuthCodeStorage {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        self.codes
            .write()
            .await
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume(
        &self,
        code: &str,
        client_id: &str,
    ) -> AuthResult<Option<AuthorizationCode>> {
        let mut codes = self.codes.write().await;
        let Some(row) = codes.get_mut(code) else {
            return Ok(None);
        };
        // Unknown, expired, consumed, and wrong-client all answer `None`.
        if row.client_id != client_id || !row.is_valid() {
            return Ok(None);
        }
        row.consumed_at = Some(OffsetDateTime::now_utc());
        Ok(Some(row.clone()))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired());
        Ok((before - codes.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn mint(ttl: Duration) -> AuthorizationCode {
        AuthorizationCode::mint(
            "grove-web",
            Uuid::new_v4(),
            "https://app.grove.example/cb",
            Some("challenge".to_string()),
            Some("S256".to_string()),
            "openid",
            ttl,
        )
    }

    #[tokio::test]
    async fn test_consume_once() {
        let store = MemoryAuthCodeStorage::new();
        let code = mint(Duration::from_secs(300));
        store.create(&code).await.unwrap();

        assert!(store.consume(&code.code, "grove-web").await.unwrap().is_some());
        assert!(store.consume(&code.code, "grove-web").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consume_failure_causes_are_uniform() {
        let store = MemoryAuthCodeStorage::new();

        // Unknown
        assert!(store.consume("missing", "grove-web").await.unwrap().is_none());

        // Wrong client
        let code = mint(Duration::from_secs(300));
        store.create(&code).await.unwrap();
        assert!(store.consume(&code.code, "other").await.unwrap().is_none());

        // Expired (the row exists, the read re-verifies)
        let mut expired = mint(Duration::from_secs(300));
        expired.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(1);
        store.create(&expired).await.unwrap();
        assert!(
            store
                .consume(&expired.code, "grove-web")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_concurrent_consume_has_one_winner() {
        let store = Arc::new(MemoryAuthCodeStorage::new());
        let code = mint(Duration::from_secs(300));
        store.create(&code).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            let code = code.code.clone();
            handles.push(tokio::spawn(async move {
                store.consume(&code, "grove-web").await.unwrap().is_some()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let store = MemoryAuthCodeStorage::new();
        let live = mint(Duration::from_secs(300));
        let mut dead = mint(Duration::from_secs(300));
        dead.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(1);
        store.create(&live).await.unwrap();
        store.create(&dead).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.consume(&live.code, "grove-web").await.unwrap().is_some());
    }
}
