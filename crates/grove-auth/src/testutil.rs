//! In-memory storage backend for the crate's own tests.
//!
//! One struct implements every storage trait over plain mutex-guarded
//! maps. The production in-memory backend lives in `grove-auth-memory`;
//! this one is deliberately small and only as atomic as the trait
//! contracts require.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::deviceflow::{DeviceCodeRecord, DeviceCodeStatus};
use crate::lockout::FailedAttemptRow;
use crate::magic::MagicCode;
use crate::oauth::{AuthorizationCode, OAuthState};
use crate::storage::{
    AllowlistStorage, AuditStorage, AuthCodeStorage, ClientStorage, DeviceCodeStorage,
    FailedAttemptStorage, MagicCodeStorage, OAuthStateStorage, RefreshTokenStorage, UserStorage,
};
use crate::token::RefreshToken;
use crate::types::{Client, GrantType, User};
use crate::AuthResult;

/// All-in-one in-memory backend.
#[derive(Default)]
pub(crate) struct TestBackend {
    clients: Mutex<HashMap<String, Client>>,
    users: Mutex<HashMap<Uuid, User>>,
    allowlist: Mutex<Vec<String>>,
    codes: Mutex<HashMap<String, AuthorizationCode>>,
    refresh_tokens: Mutex<HashMap<String, RefreshToken>>,
    magic_codes: Mutex<Vec<MagicCode>>,
    states: Mutex<HashMap<String, OAuthState>>,
    devices: Mutex<HashMap<Uuid, DeviceCodeRecord>>,
    attempts: Mutex<HashMap<String, FailedAttemptRow>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl TestBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn seed_client(&self, client_id: &str, secret: &str) -> Client {
        let client = Client {
            client_id: client_id.to_string(),
            name: client_id.to_string(),
            secret_hash: Some(crate::crypto::hash_secret(secret).unwrap()),
            redirect_uris: vec!["https://app.grove.example/callback".to_string()],
            allowed_origins: vec!["https://app.grove.example".to_string()],
            owning_domain: Some("grove.example".to_string()),
            is_internal_service: false,
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        };
        ClientStorage::create(self, &client).await.unwrap();
        client
    }

    pub(crate) async fn seed_device_client(&self, client_id: &str) -> Client {
        let client = Client {
            client_id: client_id.to_string(),
            name: client_id.to_string(),
            secret_hash: None,
            redirect_uris: vec![],
            allowed_origins: vec![],
            owning_domain: None,
            is_internal_service: false,
            grant_types: vec![GrantType::DeviceCode, GrantType::RefreshToken],
        };
        ClientStorage::create(self, &client).await.unwrap();
        client
    }

    pub(crate) async fn seed_user(&self, email: &str) -> User {
        let name = email.split('@').next().unwrap_or(email).to_string();
        let user = self.upsert(User::new(email, name, "google")).await.unwrap();
        self.add(email).await.unwrap();
        user
    }

    pub(crate) async fn create_code(&self, code: &AuthorizationCode) {
        AuthCodeStorage::create(self, code).await.unwrap();
    }

    pub(crate) async fn seed_device_record(
        &self,
        device_code_hash: &str,
        user_code: &str,
        client_id: &str,
    ) {
        let now = OffsetDateTime::now_utc();
        let record = DeviceCodeRecord {
            id: Uuid::new_v4(),
            device_code_hash: device_code_hash.to_string(),
            user_code: user_code.to_string(),
            client_id: client_id.to_string(),
            scope: "openid email profile".to_string(),
            status: DeviceCodeStatus::Pending,
            user_id: None,
            created_at: now,
            expires_at: now + time::Duration::minutes(15),
            last_polled_at: None,
        };
        assert!(self.insert_if_user_code_free(&record).await.unwrap());
    }

    pub(crate) async fn decide(
        &self,
        user_code: &str,
        status: DeviceCodeStatus,
        user_id: Option<Uuid>,
    ) {
        DeviceCodeStorage::decide(self, user_code, status, user_id)
            .await
            .unwrap();
    }

    pub(crate) async fn clear_poll(&self, device_code_hash: &str) {
        let mut devices = self.devices.lock().unwrap();
        for record in devices.values_mut() {
            if record.device_code_hash == device_code_hash {
                record.last_polled_at = None;
            }
        }
    }
}

#[async_trait]
impl ClientStorage for TestBackend {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.lock().unwrap().get(client_id).cloned())
    }

    async fn find_by_origin(&self, origin: &str) -> AuthResult<Option<Client>> {
        Ok(self
            .clients
            .lock()
            .unwrap()
            .values()
            .find(|c| c.is_origin_allowed(origin))
            .cloned())
    }

    async fn create(&self, client: &Client) -> AuthResult<()> {
        self.clients
            .lock()
            .unwrap()
            .insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn list(&self) -> AuthResult<Vec<Client>> {
        Ok(self.clients.lock().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl UserStorage for TestBackend {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn upsert(&self, user: User) -> AuthResult<User> {
        let mut users = self.users.lock().unwrap();
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

#[async_trait]
impl AllowlistStorage for TestBackend {
    async fn contains(&self, email: &str) -> AuthResult<bool> {
        let email = email.to_lowercase();
        Ok(self.allowlist.lock().unwrap().contains(&email))
    }

    async fn add(&self, email: &str) -> AuthResult<()> {
        let email = email.to_lowercase();
        let mut allowlist = self.allowlist.lock().unwrap();
        if !allowlist.contains(&email) {
            allowlist.push(email);
        }
        Ok(())
    }

    async fn remove(&self, email: &str) -> AuthResult<()> {
        let email = email.to_lowercase();
        self.allowlist.lock().unwrap().retain(|e| e != &email);
        Ok(())
    }
}

#[async_trait]
impl AuthCodeStorage for TestBackend {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        self.codes
            .lock()
            .unwrap()
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume(
        &self,
        code: &str,
        client_id: &str,
    ) -> AuthResult<Option<AuthorizationCode>> {
        let mut codes = self.codes.lock().unwrap();
        let Some(row) = codes.get_mut(code) else {
            return Ok(None);
        };
        if row.client_id != client_id || !row.is_valid() {
            return Ok(None);
        }
        row.consumed_at = Some(OffsetDateTime::now_utc());
        Ok(Some(row.clone()))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut codes = self.codes.lock().unwrap();
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired());
        Ok((before - codes.len()) as u64)
    }
}

#[async_trait]
impl RefreshTokenStorage for TestBackend {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        self.refresh_tokens
            .lock()
            .unwrap()
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.refresh_tokens.lock().unwrap().get(token_hash).cloned())
    }

    async fn revoke_if_active(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        let mut tokens = self.refresh_tokens.lock().unwrap();
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
        let mut tokens = self.refresh_tokens.lock().unwrap();
        match tokens.get_mut(token_hash) {
            Some(record) => {
                record.revoked_at.get_or_insert(OffsetDateTime::now_utc());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_family(&self, user_id: Uuid, client_id: &str) -> AuthResult<u64> {
        let mut tokens = self.refresh_tokens.lock().unwrap();
        let mut revoked = 0;
        for record in tokens.values_mut() {
            if record.user_id == user_id
                && record.client_id == client_id
                && !record.is_revoked()
            {
                record.revoked_at = Some(OffsetDateTime::now_utc());
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut tokens = self.refresh_tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired());
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl MagicCodeStorage for TestBackend {
    async fn create(&self, code: &MagicCode) -> AuthResult<()> {
        self.magic_codes.lock().unwrap().push(code.clone());
        Ok(())
    }

    async fn consume(&self, email: &str, code: &str) -> AuthResult<Option<MagicCode>> {
        let email = email.to_lowercase();
        let mut codes = self.magic_codes.lock().unwrap();
        let found = codes
            .iter_mut()
            .find(|c| c.email == email && c.code == code && c.is_valid());
        Ok(found.map(|c| {
            c.used_at = Some(OffsetDateTime::now_utc());
            c.clone()
        }))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut codes = self.magic_codes.lock().unwrap();
        let before = codes.len();
        codes.retain(|c| !c.is_expired());
        Ok((before - codes.len()) as u64)
    }
}

#[async_trait]
impl OAuthStateStorage for TestBackend {
    async fn create(&self, state: &OAuthState) -> AuthResult<()> {
        self.states
            .lock()
            .unwrap()
            .insert(state.state.clone(), state.clone());
        Ok(())
    }

    async fn consume(&self, state: &str) -> AuthResult<Option<OAuthState>> {
        let row = self.states.lock().unwrap().remove(state);
        Ok(row.filter(|s| !s.is_expired()))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut states = self.states.lock().unwrap();
        let before = states.len();
        states.retain(|_, s| !s.is_expired());
        Ok((before - states.len()) as u64)
    }
}

#[async_trait]
impl DeviceCodeStorage for TestBackend {
    async fn insert_if_user_code_free(&self, record: &DeviceCodeRecord) -> AuthResult<bool> {
        let mut devices = self.devices.lock().unwrap();
        let collision = devices.values().any(|r| {
            r.user_code == record.user_code && !r.is_expired() && !r.status.is_terminal()
        });
        if collision {
            return Ok(false);
        }
        devices.insert(record.id, record.clone());
        Ok(true)
    }

    async fn find_by_user_code(&self, user_code: &str) -> AuthResult<Option<DeviceCodeRecord>> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .values()
            .find(|r| r.user_code == user_code)
            .cloned())
    }

    async fn find_by_device_hash(
        &self,
        device_code_hash: &str,
    ) -> AuthResult<Option<DeviceCodeRecord>> {
        Ok(self
            .devices
            .lock()
            .unwrap()
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
        let mut devices = self.devices.lock().unwrap();
        let record = devices
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
        let mut devices = self.devices.lock().unwrap();
        let record = devices
            .values_mut()
            .find(|r| r.device_code_hash == device_code_hash);
        Ok(record.and_then(|r| r.last_polled_at.replace(OffsetDateTime::now_utc())))
    }

    async fn take_authorized(
        &self,
        device_code_hash: &str,
    ) -> AuthResult<Option<DeviceCodeRecord>> {
        let mut devices = self.devices.lock().unwrap();
        let id = devices
            .values()
            .find(|r| {
                r.device_code_hash == device_code_hash
                    && r.status == DeviceCodeStatus::Authorized
            })
            .map(|r| r.id);
        Ok(id.and_then(|id| devices.remove(&id)))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut devices = self.devices.lock().unwrap();
        let before = devices.len();
        devices.retain(|_, r| !r.is_expired());
        Ok((before - devices.len()) as u64)
    }
}

#[async_trait]
impl FailedAttemptStorage for TestBackend {
    async fn get(&self, email: &str) -> AuthResult<Option<FailedAttemptRow>> {
        Ok(self
            .attempts
            .lock()
            .unwrap()
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
        let mut attempts = self.attempts.lock().unwrap();
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
        self.attempts.lock().unwrap().remove(&email.to_lowercase());
        Ok(())
    }
}

#[async_trait]
impl AuditStorage for TestBackend {
    async fn append(&self, entry: &AuditEntry) -> AuthResult<()> {
        self.audit.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> AuthResult<Vec<AuditEntry>> {
        let audit = self.audit.lock().unwrap();
        Ok(audit.iter().rev().take(limit).cloned().collect())
    }
}
