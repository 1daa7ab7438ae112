//! One-time authorization codes.
//!
//! An authorization code binds (client, user, redirect URI, PKCE challenge)
//! for at most five minutes and can be consumed exactly once. Consumption
//! is the store's atomic conditional update; the record here only carries
//! the bindings and knows how to judge its own validity.
//!
//! # Security
//!
//! - 256-bit random codes, base64url-encoded
//! - Single use: concurrent exchanges see at most one winner
//! - Every failure path at exchange collapses into `invalid_grant`

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A minted authorization code awaiting exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationCode {
    /// The code itself (primary key, one-time use).
    pub code: String,

    /// Client the code was minted for.
    pub client_id: String,

    /// Authenticated user the code represents.
    pub user_id: Uuid,

    /// Redirect URI presented at mint time.
    /// The token request must present the same bytes.
    pub redirect_uri: String,

    /// PKCE challenge captured at mint time.
    ///
    /// Optional in the record because legacy rows may predate the PKCE
    /// mandate; exchange rejects any row where this is `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method ("S256").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// Granted scope (space-separated).
    pub scope: String,

    /// When the code was minted.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the code expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When the code was exchanged; `None` until consumed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub consumed_at: Option<OffsetDateTime>,
}

impl AuthorizationCode {
    /// Mints a new authorization code.
    ///
    /// The caller must already have validated the client and redirect URI;
    /// this constructor only records the bindings. A code minted with
    /// `code_challenge: None` is permanently unexchangeable, since PKCE is
    /// checked unconditionally at the token endpoint.
    #[must_use]
    pub fn mint(
        client_id: impl Into<String>,
        user_id: Uuid,
        redirect_uri: impl Into<String>,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
        scope: impl Into<String>,
        ttl: std::time::Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            code: crate::crypto::generate_token(),
            client_id: client_id.into(),
            user_id,
            redirect_uri: redirect_uri.into(),
            code_challenge,
            code_challenge_method,
            scope: scope.into(),
            created_at: now,
            expires_at: now + ttl,
            consumed_at: None,
        }
    }

    /// Returns `true` if the code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if the code has already been exchanged.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    /// Returns `true` if the code is still exchangeable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_consumed()
    }
}
