//! Authentication and authorization error types.
//!
//! Every recoverable failure in the kernel maps onto one of these variants,
//! and every variant maps onto exactly one wire-level error code and HTTP
//! status. Grant failures are intentionally coarse: not-found, expired,
//! wrong-client, wrong-redirect, and PKCE mismatch all collapse into
//! `InvalidGrant` so callers cannot use error bodies as an enumeration
//! oracle.

use std::fmt;

use time::OffsetDateTime;

/// Errors that can occur during authentication and authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is malformed or missing required parameters.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The client is unknown or presented the wrong secret.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The authorization code, refresh token, or PKCE gate failed.
    ///
    /// All grant failure causes share this variant by design.
    #[error("Invalid grant")]
    InvalidGrant,

    /// The authorization server does not support the requested grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The magic code did not verify.
    #[error("Invalid code")]
    InvalidCode,

    /// The federated ceremony state is unknown, expired, or already used.
    #[error("Invalid state")]
    InvalidState,

    /// The access token is missing, malformed, expired, or has a bad signature.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The request lacks valid authentication credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The authenticated user is not permitted by the ceremony
    /// (most commonly: not on the allowlist).
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of why access was denied.
        message: String,
    },

    /// The account is locked after too many failed attempts.
    #[error("Account locked until {locked_until}")]
    AccountLocked {
        /// When the lock expires.
        locked_until: OffsetDateTime,
    },

    /// The caller exceeded a rate limit.
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimited {
        /// Seconds until the window resets.
        retry_after: u64,
    },

    /// A device-flow client is polling faster than the advertised interval.
    #[error("Polling too fast")]
    SlowDown,

    /// The device-flow authorization is still pending user action.
    #[error("Authorization pending")]
    AuthorizationPending,

    /// The device code has expired before the user decided.
    #[error("Device code expired")]
    ExpiredToken,

    /// An error occurred while storing or retrieving auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The external identity provider dialog failed.
    #[error("Identity provider error: {provider} - {message}")]
    IdentityProvider {
        /// The identity provider name.
        provider: String,
        /// Description of the error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `IdentityProvider` error.
    #[must_use]
    pub fn identity_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::IdentityProvider { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns the error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest { .. } | Self::UnsupportedGrantType { .. } => {
                ErrorCategory::Validation
            }
            Self::InvalidClient { .. }
            | Self::InvalidGrant
            | Self::InvalidCode
            | Self::InvalidState
            | Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::InvalidToken { .. } => ErrorCategory::Token,
            Self::AccessDenied { .. } | Self::AccountLocked { .. } => ErrorCategory::Authorization,
            Self::RateLimited { .. } | Self::SlowDown => ErrorCategory::Throttling,
            Self::AuthorizationPending | Self::ExpiredToken => ErrorCategory::DeviceFlow,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::IdentityProvider { .. } => ErrorCategory::Federation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the wire-level error code for this error.
    ///
    /// These are the strings that appear in the `error` field of every
    /// JSON error body, OAuth-standard where one exists.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::InvalidCode => "invalid_code",
            Self::InvalidState => "invalid_state",
            Self::InvalidToken { .. } => "invalid_token",
            Self::Unauthorized { .. } => "unauthorized",
            Self::AccessDenied { .. } => "access_denied",
            Self::AccountLocked { .. } => "account_locked",
            Self::RateLimited { .. } => "rate_limit",
            Self::SlowDown => "slow_down",
            Self::AuthorizationPending => "authorization_pending",
            Self::ExpiredToken => "expired_token",
            Self::Storage { .. }
            | Self::Configuration { .. }
            | Self::IdentityProvider { .. }
            | Self::Internal { .. } => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// `invalid_client` is 401 at the token endpoints per RFC 6749 §5.2;
    /// handlers that need the 400 form elsewhere map it themselves.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest { .. }
            | Self::InvalidGrant
            | Self::InvalidState
            | Self::UnsupportedGrantType { .. }
            | Self::AuthorizationPending
            | Self::ExpiredToken => 400,
            Self::InvalidClient { .. }
            | Self::InvalidCode
            | Self::InvalidToken { .. }
            | Self::Unauthorized { .. } => 401,
            Self::AccessDenied { .. } => 403,
            Self::AccountLocked { .. } => 423,
            Self::RateLimited { .. } | Self::SlowDown => 429,
            Self::Storage { .. }
            | Self::Configuration { .. }
            | Self::IdentityProvider { .. }
            | Self::Internal { .. } => 500,
        }
    }
}

/// Categories of authentication/authorization errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Request validation errors.
    Validation,
    /// Authentication-related errors (identity verification).
    Authentication,
    /// Authorization-related errors (permission checks).
    Authorization,
    /// Token-related errors (validation, expiration).
    Token,
    /// Rate limiting and polling backpressure.
    Throttling,
    /// Device-flow lifecycle states surfaced as errors.
    DeviceFlow,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Identity provider federation errors.
    Federation,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Throttling => write!(f, "throttling"),
            Self::DeviceFlow => write!(f, "device_flow"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Federation => write!(f, "federation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_client("client not found");
        assert_eq!(err.to_string(), "Invalid client: client not found");

        let err = AuthError::InvalidGrant;
        assert_eq!(err.to_string(), "Invalid grant");

        let err = AuthError::identity_provider("google", "connection failed");
        assert_eq!(
            err.to_string(),
            "Identity provider error: google - connection failed"
        );
    }

    #[test]
    fn test_grant_failures_are_indistinguishable() {
        // Whatever the cause, the wire shape is the same.
        let err = AuthError::InvalidGrant;
        assert_eq!(err.error_code(), "invalid_grant");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.to_string(), "Invalid grant");
    }

    #[test]
    fn test_error_predicates() {
        assert!(AuthError::invalid_client("x").is_client_error());
        assert!(!AuthError::invalid_client("x").is_server_error());

        assert!(AuthError::storage("database down").is_server_error());
        assert!(!AuthError::storage("database down").is_client_error());

        assert!(AuthError::SlowDown.is_client_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AuthError::invalid_request("x").error_code(),
            "invalid_request"
        );
        assert_eq!(AuthError::InvalidCode.error_code(), "invalid_code");
        assert_eq!(
            AuthError::unsupported_grant_type("implicit").error_code(),
            "unsupported_grant_type"
        );
        assert_eq!(AuthError::SlowDown.error_code(), "slow_down");
        assert_eq!(
            AuthError::AuthorizationPending.error_code(),
            "authorization_pending"
        );
        assert_eq!(AuthError::storage("x").error_code(), "server_error");
        assert_eq!(AuthError::internal("x").error_code(), "server_error");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(AuthError::invalid_request("x").http_status(), 400);
        assert_eq!(AuthError::invalid_client("x").http_status(), 401);
        assert_eq!(AuthError::InvalidGrant.http_status(), 400);
        assert_eq!(AuthError::InvalidCode.http_status(), 401);
        assert_eq!(AuthError::access_denied("x").http_status(), 403);
        assert_eq!(
            AuthError::AccountLocked {
                locked_until: OffsetDateTime::now_utc() + Duration::minutes(15)
            }
            .http_status(),
            423
        );
        assert_eq!(AuthError::RateLimited { retry_after: 30 }.http_status(), 429);
        assert_eq!(AuthError::SlowDown.http_status(), 429);
        assert_eq!(AuthError::internal("x").http_status(), 500);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::invalid_client("x").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            AuthError::access_denied("x").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            AuthError::RateLimited { retry_after: 1 }.category(),
            ErrorCategory::Throttling
        );
        assert_eq!(
            AuthError::identity_provider("google", "x").category(),
            ErrorCategory::Federation
        );
        assert_eq!(AuthError::storage("x").category(), ErrorCategory::Infrastructure);
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Authentication.to_string(), "authentication");
        assert_eq!(ErrorCategory::Throttling.to_string(), "throttling");
        assert_eq!(ErrorCategory::DeviceFlow.to_string(), "device_flow");
    }
}
