//! Pending federated-ceremony state.
//!
//! When a client starts a federated sign-in, everything that must survive
//! the round trip through the external provider is persisted server-side
//! under an opaque state token. The row is deleted when the callback
//! consumes it, so a state can be used at most once; replay surfaces as
//! `invalid_state`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A pending federated sign-in awaiting its callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthState {
    /// Internal opaque state token (primary key); this is what travels
    /// through the external provider, never the client's own state.
    pub state: String,

    /// Which provider the user was sent to.
    pub provider: String,

    /// Client that initiated the ceremony.
    pub client_id: String,

    /// Redirect URI to send the user back to.
    pub redirect_uri: String,

    /// The client's original `state` parameter, echoed back verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_state: Option<String>,

    /// PKCE challenge from the client's authorization request, carried
    /// forward into the authorization code minted after the callback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method ("S256").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// When the ceremony was started.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the pending ceremony expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl OAuthState {
    /// Creates a pending ceremony row with a fresh internal state token.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        ttl: std::time::Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            state: crate::crypto::generate_token(),
            provider: provider.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            client_state: None,
            code_challenge: None,
            code_challenge_method: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Records the client's original state parameter.
    #[must_use]
    pub fn with_client_state(mut self, state: impl Into<String>) -> Self {
        self.client_state = Some(state.into());
        self
    }

    /// Records the client's PKCE challenge.
    #[must_use]
    pub fn with_code_challenge(
        mut self,
        challenge: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = Some(method.into());
        self
    }

    /// Returns `true` if the pending ceremony has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }
}
