//! In-memory failed-attempt storage.
//!
//! The increment and the lock decision happen under one write lock, the
//! in-memory equivalent of the single transaction the trait requires.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use grove_auth::AuthResult;
use grove_auth::lockout::FailedAttemptRow;
use grove_auth::storage::FailedAttemptStorage;

/// Failed attempts keyed by lowercased email.
#[derive(Default)]
pub struct MemoryFailedAttemptStorage {
    attempts: RwLock<HashMap<String, FailedAttemptRow>>,
}

impl MemoryFailedAttemptStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FailedAttemptStorage for MemoryFailedAttemptStorage {
    async fn get(&self, email: &str) -> AuthResult<Option<FailedAttemptRow>> {
        Ok(self
            .attempts
            .read()
            .await
            .get(&email.to_lowercase())
            .cloned())
    }

    async fn record_failure(
        &self,
        email: &str,
        threshold: u32,
        lock_duration: std::time::Duration,
    ) -> AuthResult<FailedAttemptRow> {
        let email = email.to_lowercase();
        let mut attempts = self.attempts.write().await;
        let row = attempts
            .entry(email.clone())
            .and_modify(|r| {
                r.count += 1;
                r.last_attempt_at = OffsetDateTime::now_utc();
            })
            .or_insert_with(|| FailedAttemptRow::first_failure(&email));

        if row.count >= threshold && row.locked_until.is_none() {
            row.locked_until = Some(OffsetDateTime::now_utc() + lock_duration);
        }
        Ok(row.clone())
    }

    async fn clear(&self, email: &str) -> AuthResult<()> {
        self.attempts.write().await.remove(&email.to_lowercase());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_at_threshold() {
        let store = MemoryFailedAttemptStorage::new();

        for i in 1..5u32 {
            let row = store
                .record_failure("a@x", 5, Duration::from_secs(900))
                .await
                .unwrap();
            assert_eq!(row.count, i);
            assert!(!row.is_locked());
        }

        let row = store
            .record_failure("a@x", 5, Duration::from_secs(900))
            .await
            .unwrap();
        assert_eq!(row.count, 5);
        assert!(row.is_locked());
    }

    #[tokio::test]
    async fn test_concurrent_failures_lock_exactly_once() {
        let store = Arc::new(MemoryFailedAttemptStorage::new());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .record_failure("raced@x", 5, Duration::from_secs(900))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let row = store.get("raced@x").await.unwrap().unwrap();
        assert_eq!(row.count, 10);
        assert!(row.is_locked());
    }

    #[tokio::test]
    async fn test_clear_resets() {
        let store = MemoryFailedAttemptStorage::new();
        store
            .record_failure("a@x", 5, Duration::from_secs(900))
            .await
            .unwrap();

        store.clear("A@X").await.unwrap();
        assert!(store.get("a@x").await.unwrap().is_none());

        // Next failure starts from one.
        let row = store
            .record_failure("a@x", 5, Duration::from_secs(900))
            .await
            .unwrap();
        assert_eq!(row.count, 1);
    }
}
