//! Device-flow minting and user decisions.
//!
//! Minting retries user-code generation a bounded number of times on
//! collision with a live record. The approve/deny step re-checks the
//! allowlist at decision time: a user whose membership lapsed between
//! login and approval is rejected.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit::{AuditEventKind, AuditLogger, RequestMeta};
use crate::config::AuthConfig;
use crate::deviceflow::{DeviceCodeRecord, DeviceCodeStatus, generate_user_code};
use crate::error::AuthError;
use crate::storage::{AllowlistStorage, ClientStorage, DeviceCodeStorage};
use crate::types::User;
use crate::AuthResult;

/// Attempts to find a free user code before giving up.
const USER_CODE_RETRIES: usize = 5;

/// Response to a device authorization request (RFC 8628 §3.2).
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAuthorizationResponse {
    /// The long CLI-side secret, returned once and stored only by hash.
    pub device_code: String,
    /// The short code the user types.
    pub user_code: String,
    /// Where the user goes to type it.
    pub verification_uri: String,
    /// Same, with the user code pre-filled.
    pub verification_uri_complete: String,
    /// Seconds until the pair expires.
    pub expires_in: u64,
    /// Minimum seconds between token-endpoint polls.
    pub interval: u64,
}

/// The device-authorization engine.
pub struct DeviceFlowService {
    devices: Arc<dyn DeviceCodeStorage>,
    clients: Arc<dyn ClientStorage>,
    allowlist: Arc<dyn AllowlistStorage>,
    audit: AuditLogger,
    config: AuthConfig,
}

impl DeviceFlowService {
    /// Creates the engine over its collaborators.
    #[must_use]
    pub fn new(
        devices: Arc<dyn DeviceCodeStorage>,
        clients: Arc<dyn ClientStorage>,
        allowlist: Arc<dyn AllowlistStorage>,
        audit: AuditLogger,
        config: AuthConfig,
    ) -> Self {
        Self {
            devices,
            clients,
            allowlist,
            audit,
            config,
        }
    }

    /// Mints a `(device_code, user_code)` pair for a client.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if no free user code is found within the retry
    /// budget, or a storage error.
    pub async fn mint(
        &self,
        client_id: &str,
        scope: Option<&str>,
        meta: &RequestMeta,
    ) -> AuthResult<DeviceAuthorizationResponse> {
        let device_code = crate::crypto::generate_token();
        let device_code_hash = crate::crypto::sha256_hex(&device_code);
        let now = OffsetDateTime::now_utc();
        let scope = scope.unwrap_or("openid email profile");

        for _ in 0..USER_CODE_RETRIES {
            let record = DeviceCodeRecord {
                id: Uuid::new_v4(),
                device_code_hash: device_code_hash.clone(),
                user_code: generate_user_code(),
                client_id: client_id.to_string(),
                scope: scope.to_string(),
                status: DeviceCodeStatus::Pending,
                user_id: None,
                created_at: now,
                expires_at: now + self.config.lifetimes.device_code,
                last_polled_at: None,
            };

            if self.devices.insert_if_user_code_free(&record).await? {
                self.audit.emit(
                    AuditEventKind::DeviceCodeCreated,
                    None,
                    Some(client_id),
                    meta,
                    json!({"user_code": record.user_code}),
                );

                let verification_uri = self.config.device_verification_uri();
                return Ok(DeviceAuthorizationResponse {
                    device_code,
                    verification_uri_complete: format!(
                        "{verification_uri}?user_code={}",
                        record.user_code
                    ),
                    verification_uri,
                    user_code: record.user_code,
                    expires_in: self.config.lifetimes.device_code.as_secs(),
                    interval: self.config.lifetimes.device_poll_interval.as_secs(),
                });
            }
        }

        Err(AuthError::internal("could not allocate a unique user code"))
    }

    /// Looks up a pending authorization for the approval page.
    ///
    /// Returns the record and the client's display name. Expired or
    /// decided records are not shown.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    pub async fn pending_for_approval(
        &self,
        user_code: &str,
    ) -> AuthResult<Option<(DeviceCodeRecord, String)>> {
        let Some(record) = self.devices.find_by_user_code(user_code).await? else {
            return Ok(None);
        };
        if record.is_expired() || record.status.is_terminal() {
            return Ok(None);
        }

        let client_name = self
            .clients
            .find_by_client_id(&record.client_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_else(|| record.client_id.clone());

        Ok(Some((record, client_name)))
    }

    /// Applies the user's approve/deny decision.
    ///
    /// The allowlist is re-checked here, at decision time, regardless of
    /// when the session was established.
    ///
    /// # Errors
    ///
    /// - `AccessDenied` if the user's allowlist membership has lapsed
    /// - `ExpiredToken` if the pair expired before the decision
    /// - `InvalidGrant` if the record is unknown or already decided
    pub async fn decide(
        &self,
        user_code: &str,
        approve: bool,
        user: &User,
        meta: &RequestMeta,
    ) -> AuthResult<()> {
        if !self.config.public_signup && !self.allowlist.contains(&user.email).await? {
            self.audit.emit(
                AuditEventKind::DeviceCodeDenied,
                Some(user.id),
                None,
                meta,
                json!({"user_code": user_code, "reason": "not_allowlisted"}),
            );
            return Err(AuthError::access_denied("email is not permitted"));
        }

        let Some(record) = self.devices.find_by_user_code(user_code).await? else {
            return Err(AuthError::InvalidGrant);
        };
        if record.is_expired() {
            return Err(AuthError::ExpiredToken);
        }

        let status = if approve {
            DeviceCodeStatus::Authorized
        } else {
            DeviceCodeStatus::Denied
        };

        // The storage transition only succeeds from `pending`; a second
        // decision finds an absorbing state and gets nothing.
        let updated = self
            .devices
            .decide(&record.user_code, status, Some(user.id))
            .await?;
        if updated.is_none() {
            return Err(AuthError::InvalidGrant);
        }

        let kind = if approve {
            AuditEventKind::DeviceCodeAuthorized
        } else {
            AuditEventKind::DeviceCodeDenied
        };
        self.audit.emit(
            kind,
            Some(user.id),
            Some(&record.client_id),
            meta,
            json!({"user_code": record.user_code}),
        );

        Ok(())
    }
}
