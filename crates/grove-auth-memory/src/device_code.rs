//! In-memory device authorization storage.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use grove_auth::AuthResult;
use grove_auth::deviceflow::{DeviceCodeRecord, DeviceCodeStatus};
use grove_auth::storage::DeviceCodeStorage;

/// Device authorizations keyed by record id.
#[derive(Default)]
pub struct MemoryDeviceCodeStorage {
    records: RwLock<HashMap<Uuid, DeviceCodeRecord>>,
}

impl MemoryDeviceCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceCodeStorage for MemoryDeviceCodeStorage {
    async fn insert_if_user_code_free(&self, record: &DeviceCodeRecord) -> AuthResult<bool> {
        let mut records = self.records.write().await;
        // A user code is taken while any live, undecided record holds it.
        let collision = records.values().any(|r| {
            r.user_code == record.user_code && !r.is_expired() && !r.status.is_terminal()
        });
        if collision {
            return Ok(false);
        }
        records.insert(record.id, record.clone());
        Ok(true)
    }

    async fn find_by_user_code(&self, user_code: &str) -> AuthResult<Option<DeviceCodeRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.user_code == user_code)
            .cloned())
    }

    async fn find_by_device_hash(
        &self,
        device_code_hash: &str,
    ) -> AuthResult<Option<DeviceCodeRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.device_code_hash == device_code_hash)
            .cloned())
    }

    async fn decide(
        &self,
        user_code: &str,
        status: DeviceCodeStatus,
        user_id: Option<Uuid>,
    ) -> AuthResult<Option<DeviceCodeRecord>> {
        let mut records = self.records.write().await;
        let record = records
            .values_mut()
            .find(|r| r.user_code == user_code && r.status == DeviceCodeStatus::Pending);
        Ok(record.map(|r| {
            r.status = status;
            r.user_id = user_id;
            r.clone()
        }))
    }

    async fn mark_polled(
        &self,
        device_code_hash: &str,
    ) -> AuthResult<Option<OffsetDateTime>> {
        let mut records = self.records.write().await;
        let record = records
            .values_mut()
            .find(|r| r.device_code_hash == device_code_hash);
        Ok(record.and_then(|r| r.last_polled_at.replace(OffsetDateTime::now_utc())))
    }

    async fn take_authorized(
        &self,
        device_code_hash: &str,
    ) -> AuthResult<Option<DeviceCodeRecord>> {
        let mut records = self.records.write().await;
        let id = records
            .values()
            .find(|r| {
                r.device_code_hash == device_code_hash
                    && r.status == DeviceCodeStatus::Authorized
            })
            .map(|r| r.id);
        Ok(id.and_then(|id| records.remove(&id)))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired());
        Ok((before - records.len()) as u64)
    }
}
