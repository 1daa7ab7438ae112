//! Session record types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Inputs for creating a session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    /// Stable hash of (user agent, IP) for device recognition.
    pub fingerprint: String,
    /// Human-readable device name ("Chrome on macOS").
    pub device_name: String,
    /// Client IP at creation.
    pub ip: Option<String>,
    /// Raw User-Agent header at creation.
    pub user_agent: Option<String>,
}

/// A live (or revoked) session owned by a user's shard.
///
/// The session holds the owning user's id; the user does not hold session
/// back-pointers. Lifetime is bounded by `expires_at` regardless of
/// activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session id (the value sealed into the cookie).
    pub id: Uuid,

    /// Owning user.
    pub user_id: Uuid,

    /// Device fingerprint.
    pub fingerprint: String,

    /// Human-readable device name.
    pub device_name: String,

    /// IP at creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// User agent at creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Most recent successful validation.
    #[serde(with = "time::serde::rfc3339")]
    pub last_active_at: OffsetDateTime,

    /// Absolute expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the session has been revoked.
    pub revoked: bool,
}

impl SessionRecord {
    /// Creates a record from creation inputs.
    #[must_use]
    pub fn new(user_id: Uuid, new: NewSession, ttl: std::time::Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            user_id,
            fingerprint: new.fingerprint,
            device_name: new.device_name,
            ip: new.ip,
            user_agent: new.user_agent,
            created_at: now,
            last_active_at: now,
            expires_at: now + ttl,
            revoked: false,
        }
    }

    /// Returns `true` if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if the session is usable.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}
