//! Security event audit logging.
//!
//! Every security-relevant transition emits an [`AuditEntry`]: logins,
//! token lifecycle, magic-code and device-code ceremonies, passkey events.
//! Emission is fire-and-forget; a failing audit write is logged and
//! dropped, never propagated into the originating request. Entries carry
//! IP, user agent, and event-specific JSON details, and never contain
//! secrets, tokens, or code bodies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::AuditStorage;

/// Audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A user authenticated successfully.
    Login,
    /// A user ended their session.
    Logout,
    /// An authentication attempt failed.
    FailedLogin,
    /// An authorization code was exchanged for tokens.
    TokenExchange,
    /// A refresh token was rotated.
    TokenRefresh,
    /// A token was revoked (explicitly or by replay detection).
    TokenRevoke,
    /// A magic code was generated and handed to the mailer.
    MagicCodeSent,
    /// A magic code verified successfully.
    MagicCodeVerified,
    /// A device authorization was minted.
    DeviceCodeCreated,
    /// A user approved a device authorization.
    DeviceCodeAuthorized,
    /// A user denied a device authorization.
    DeviceCodeDenied,
    /// A passkey credential was registered.
    PasskeyRegistered,
    /// A passkey credential was deleted.
    PasskeyDeleted,
    /// A passkey assertion verified.
    PasskeyAuthSuccess,
    /// A passkey assertion failed.
    PasskeyAuthFailed,
}

impl AuditEventKind {
    /// Returns the wire/storage name of the event kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::FailedLogin => "failed_login",
            Self::TokenExchange => "token_exchange",
            Self::TokenRefresh => "token_refresh",
            Self::TokenRevoke => "token_revoke",
            Self::MagicCodeSent => "magic_code_sent",
            Self::MagicCodeVerified => "magic_code_verified",
            Self::DeviceCodeCreated => "device_code_created",
            Self::DeviceCodeAuthorized => "device_code_authorized",
            Self::DeviceCodeDenied => "device_code_denied",
            Self::PasskeyRegistered => "passkey_registered",
            Self::PasskeyDeleted => "passkey_deleted",
            Self::PasskeyAuthSuccess => "passkey_auth_success",
            Self::PasskeyAuthFailed => "passkey_auth_failed",
        }
    }
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request provenance attached to audit entries.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Client IP, as seen through proxy headers.
    pub ip: Option<String>,
    /// Raw User-Agent header.
    pub user_agent: Option<String>,
}

impl RequestMeta {
    /// Creates request metadata.
    #[must_use]
    pub fn new(ip: Option<String>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }
}

/// An append-only audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Entry id.
    pub id: Uuid,

    /// What happened.
    pub kind: AuditEventKind,

    /// The user involved, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,

    /// The client involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client IP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// User agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Event-specific details.
    pub details: Value,

    /// When the event occurred.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fire-and-forget audit emitter over an [`AuditStorage`].
#[derive(Clone)]
pub struct AuditLogger {
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Creates a logger over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn AuditStorage>) -> Self {
        Self { storage }
    }

    /// Emits an audit entry without waiting for the write.
    ///
    /// The write happens on a spawned task; failure is logged at `warn`
    /// and otherwise dropped, so auditing can never fail the originating
    /// request.
    pub fn emit(
        &self,
        kind: AuditEventKind,
        user_id: Option<Uuid>,
        client_id: Option<&str>,
        meta: &RequestMeta,
        details: Value,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            kind,
            user_id,
            client_id: client_id.map(str::to_string),
            ip: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            details,
            created_at: OffsetDateTime::now_utc(),
        };

        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move {
            if let Err(err) = storage.append(&entry).await {
                tracing::warn!(kind = %entry.kind, error = %err, "audit write failed");
            }
        });
    }

    /// Writes an audit entry and waits for the result.
    ///
    /// Used by tests and shutdown paths that need the entry durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub async fn emit_sync(
        &self,
        kind: AuditEventKind,
        user_id: Option<Uuid>,
        client_id: Option<&str>,
        meta: &RequestMeta,
        details: Value,
    ) -> crate::AuthResult<()> {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            kind,
            user_id,
            client_id: client_id.map(str::to_string),
            ip: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            details,
            created_at: OffsetDateTime::now_utc(),
        };
        self.storage.append(&entry).await
    }
}
