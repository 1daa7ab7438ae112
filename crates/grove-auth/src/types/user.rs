//! End-user domain type.
//!
//! Users are created on first successful authentication (federated callback
//! or magic-code verify) and refreshed with the latest profile data on every
//! subsequent one. There is no self-service registration: whether an email
//! may authenticate at all is the allowlist's decision.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// An authenticated end-user.
///
/// Emails are case-folded to lowercase at every boundary so that lookups,
/// allowlist checks, and magic-code scoping all agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque user identifier.
    pub id: Uuid,

    /// Lowercased email address (unique).
    pub email: String,

    /// Display name from the most recent successful authentication.
    pub name: String,

    /// Avatar URI, if the identity provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Which federated provider created this record ("google", "github",
    /// or "magic" for mailbox-verified users).
    pub provider: String,

    /// Whether this user may call administrative endpoints.
    #[serde(default)]
    pub is_admin: bool,

    /// When the record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Last successful authentication.
    #[serde(with = "time::serde::rfc3339")]
    pub last_login_at: OffsetDateTime,
}

impl User {
    /// Creates a new user record from a first successful authentication.
    ///
    /// The email is lowercased here so callers cannot accidentally store a
    /// mixed-case variant.
    #[must_use]
    pub fn new(email: &str, name: impl Into<String>, provider: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            email: email.to_lowercase(),
            name: name.into(),
            avatar_url: None,
            provider: provider.into(),
            is_admin: false,
            created_at: now,
            last_login_at: now,
        }
    }

    /// Sets the avatar URL.
    #[must_use]
    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    /// Refreshes mutable profile fields after a successful authentication.
    ///
    /// Called on every login so the record tracks the provider's latest
    /// display name and avatar.
    pub fn refresh_profile(&mut self, name: &str, avatar_url: Option<&str>) {
        self.name = name.to_string();
        if let Some(url) = avatar_url {
            self.avatar_url = Some(url.to_string());
        }
        self.last_login_at = OffsetDateTime::now_utc();
    }
}
