//! Rotating refresh tokens.
//!
//! The token value itself is never stored; only its SHA-256 hash is
//! persisted, keyed by (user, client). A successful refresh revokes the
//! presented token and issues a new one atomically, so presenting an
//! already-revoked token can never yield a new pair.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A refresh token record as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    /// Unique identifier for this record.
    pub id: Uuid,

    /// SHA-256 hash of the token value (hex).
    pub token_hash: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// User that authorized the token.
    pub user_id: Uuid,

    /// Granted scope (space-separated).
    pub scope: String,

    /// When the token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Absolute expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When the token was revoked; `None` while live.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,
}

impl RefreshToken {
    /// Creates a record for a freshly generated token value.
    ///
    /// Only the hash of `token` is retained.
    #[must_use]
    pub fn issue(
        token: &str,
        client_id: impl Into<String>,
        user_id: Uuid,
        scope: impl Into<String>,
        ttl: std::time::Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            token_hash: Self::hash_token(token),
            client_id: client_id.into(),
            user_id,
            scope: scope.into(),
            created_at: now,
            expires_at: now + ttl,
            revoked_at: None,
        }
    }

    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if this token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Returns `true` if this token is usable (not expired, not revoked).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_revoked()
    }

    /// Hashes a token value for storage or lookup.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        crate::crypto::sha256_hex(token)
    }

    /// Generates a fresh token value: 32 random bytes, base64url.
    #[must_use]
    pub fn generate_token() -> String {
        crate::crypto::generate_token()
    }
}
