//! In-memory audit storage.

use async_trait::async_trait;
use tokio::sync::RwLock;

use grove_auth::AuthResult;
use grove_auth::audit::AuditEntry;
use grove_auth::storage::AuditStorage;

/// Append-only audit log in memory.
#[derive(Default)]
pub struct MemoryAuditStorage {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditStorage {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStorage for MemoryAuditStorage {
    async fn append(&self, entry: &AuditEntry) -> AuthResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> AuthResult<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_auth::audit::{AuditEventKind, RequestMeta};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn entry(kind: AuditEventKind) -> AuditEntry {
        let meta = RequestMeta::new(Some("1.2.3.4".to_string()), None);
        AuditEntry {
            id: Uuid::new_v4(),
            kind,
            user_id: None,
            client_id: None,
            ip: meta.ip,
            user_agent: meta.user_agent,
            details: serde_json::json!({}),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn test_append_and_recent() {
        let store = MemoryAuditStorage::new();
        store.append(&entry(AuditEventKind::Login)).await.unwrap();
        store.append(&entry(AuditEventKind::Logout)).await.unwrap();
        store
            .append(&entry(AuditEventKind::TokenExchange))
            .await
            .unwrap();

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first.
        assert_eq!(recent[0].kind, AuditEventKind::TokenExchange);
        assert_eq!(recent[1].kind, AuditEventKind::Logout);
    }
}
