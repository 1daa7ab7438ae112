//! OAuth 2.0 client domain types.
//!
//! Clients are registered out-of-band (bootstrap configuration or
//! administrative migration) and are immutable from the kernel's
//! perspective. The secret is stored as an Argon2id hash and verified
//! through the constant-time PHC verifier; the plaintext never reaches
//! the store.

use serde::{Deserialize, Serialize};

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
///
/// Defines the authorization flows a client is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow with mandatory PKCE.
    AuthorizationCode,
    /// Refresh Token rotation.
    RefreshToken,
    /// Device Authorization grant (RFC 8628) for input-constrained clients.
    DeviceCode,
}

impl GrantType {
    /// Returns the OAuth 2.0 `grant_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::DeviceCode => "urn:ietf:params:oauth:grant-type:device_code",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth 2.0 client application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Human-readable display name, shown on the device approval page.
    pub name: String,

    /// Argon2id hash of the client secret (None for public clients).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,

    /// Exact-match redirect URIs for the authorization code flow.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Origins allowed for CORS requests from browser-based clients.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// The registrable domain this client belongs to, if any.
    /// Internal services under the same parent domain share the session cookie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owning_domain: Option<String>,

    /// Whether this is a pre-trusted first-party service.
    ///
    /// Internal services receive the session cookie directly after federated
    /// sign-in instead of going through the code exchange.
    #[serde(default)]
    pub is_internal_service: bool,

    /// OAuth 2.0 grant types this client is allowed to use.
    pub grant_types: Vec<GrantType>,
}

impl Client {
    /// Validates the client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is internally inconsistent.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.name.is_empty() {
            return Err(ClientValidationError::EmptyName);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        // Authorization code flow is meaningless without somewhere to land
        if self.grant_types.contains(&GrantType::AuthorizationCode)
            && self.redirect_uris.is_empty()
        {
            return Err(ClientValidationError::NoRedirectUris);
        }

        Ok(())
    }

    /// Checks whether the given redirect URI is registered for this client.
    ///
    /// Comparison is byte-exact; no prefix or wildcard matching.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks whether the given origin is allowed for CORS.
    #[must_use]
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    /// Checks whether the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Verifies a presented client secret against the stored hash.
    ///
    /// Returns `false` for public clients (no stored hash), for a wrong
    /// secret, and for a corrupted stored hash. The underlying Argon2
    /// verification is constant-time in the secret.
    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        match &self.secret_hash {
            Some(hash) => crate::crypto::verify_secret(secret, hash).unwrap_or(false),
            None => false,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Errors that can occur during client validation.
#[derive(Debug, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// Client name cannot be empty.
    #[error("Client name cannot be empty")]
    EmptyName,

    /// At least one grant type is required.
    #[error("At least one grant type is required")]
    NoGrantTypes,

    /// Authorization code flow requires redirect URIs.
    #[error("Authorization code flow requires redirect URIs")]
    NoRedirectUris,
}

// =============================================================================
// Tests
// =============================================================================
