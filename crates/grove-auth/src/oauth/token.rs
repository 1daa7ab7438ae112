//! Token endpoint wire types.
//!
//! Request parsing, response generation, and error bodies for the token
//! endpoint. Different fields are required per `grant_type`:
//!
//! - `authorization_code`: code, redirect_uri, code_verifier, client_id
//! - `refresh_token`: refresh_token
//! - `urn:ietf:params:oauth:grant-type:device_code`: device_code, client_id

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token request parameters (form-encoded).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type. The `/token/refresh` alias fills this in;
    /// an empty value at `/token` reads as an unsupported grant.
    #[serde(default)]
    pub grant_type: String,

    /// Authorization code (authorization_code grant).
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI; must match the one bound to the code byte-for-byte.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// PKCE code verifier. Mandatory for the authorization_code grant.
    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Client ID.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (client_secret_post authentication).
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Refresh token (refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Device code (device_code grant).
    #[serde(default)]
    pub device_code: Option<String>,

    /// Requested scope.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Successful token response.
///
/// # Example Response
///
/// ```json
/// {
///   "access_token": "eyJhbG...",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "scope": "openid email profile",
///   "refresh_token": "3q2-V0..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The signed access token (RS256 JWT).
    pub access_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Rotating refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Creates a new token response.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            refresh_token: None,
        }
    }

    /// Attaches the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }
}

/// Token error response body.
///
/// ```json
/// {"error": "invalid_grant"}
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TokenErrorBody {
    /// OAuth 2.0 error code.
    pub error: TokenErrorCode,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl TokenErrorBody {
    /// Creates an error body without a description.
    #[must_use]
    pub fn new(error: TokenErrorCode) -> Self {
        Self {
            error,
            error_description: None,
        }
    }

    /// Creates an error body with a description.
    #[must_use]
    pub fn with_description(error: TokenErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }
}

/// Token endpoint error codes.
///
/// RFC 6749 §5.2 plus the RFC 8628 §3.5 device-flow additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorCode {
    /// Malformed request, missing or duplicated parameters.
    InvalidRequest,

    /// Client authentication failed.
    InvalidClient,

    /// The grant (code, refresh token, PKCE gate, redirect binding) failed.
    InvalidGrant,

    /// The grant type is not supported by this server.
    UnsupportedGrantType,

    /// Device flow: user has not decided yet; keep polling.
    AuthorizationPending,

    /// Device flow: polling faster than the advertised interval.
    SlowDown,

    /// Device flow: the user denied the request, or the user is not
    /// permitted by the ceremony.
    AccessDenied,

    /// Device flow: the device code expired before the user decided.
    ExpiredToken,
}

impl TokenErrorCode {
    /// Returns the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::AuthorizationPending => "authorization_pending",
            Self::SlowDown => "slow_down",
            Self::AccessDenied => "access_denied",
            Self::ExpiredToken => "expired_token",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient => 401,
            Self::AccessDenied => 403,
            Self::SlowDown => 429,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnsupportedGrantType
            | Self::AuthorizationPending
            | Self::ExpiredToken => 400,
        }
    }
}

impl fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
