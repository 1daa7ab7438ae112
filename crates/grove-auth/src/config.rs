//! Kernel configuration.
//!
//! All knobs that govern ceremony behavior live here: token lifetimes,
//! lockout policy, cookie scoping, per-step timeouts, and the two global
//! switches (`public_signup`, `revoke_family_on_replay`). The struct is
//! deserialized from the server's layered configuration; every field has a
//! production-safe default so a minimal deployment only needs the issuer,
//! the base URL, and the session secret.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required field is missing or empty.
    #[error("Missing required configuration: {field}")]
    MissingField {
        /// Name of the missing field.
        field: String,
    },

    /// A field holds an unusable value.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidField {
        /// Name of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Top-level kernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The `iss` claim stamped into every access token.
    pub issuer: String,

    /// Externally reachable base URL of this server, used to build the
    /// device-flow verification URIs and the federated callback URL.
    pub base_url: String,

    /// Secret backing the session cookie keys (AEAD + legacy HMAC).
    /// Immutable for the process lifetime.
    pub session_secret: String,

    /// When true, any authenticated email may create an account;
    /// when false (default), the allowlist governs the population.
    pub public_signup: bool,

    /// When true (default), presenting an already-revoked refresh token
    /// revokes every refresh token for that (user, client) pair.
    pub revoke_family_on_replay: bool,

    /// Cookie scoping.
    pub cookie: CookieConfig,

    /// Lifetimes of everything the kernel mints.
    pub lifetimes: LifetimeConfig,

    /// Failed-attempt lockout policy.
    pub lockout: LockoutConfig,

    /// Per-step timeouts for external collaborators.
    pub timeouts: TimeoutConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "https://auth.grove.example".to_string(),
            base_url: "https://auth.grove.example".to_string(),
            session_secret: String::new(),
            public_signup: false,
            revoke_family_on_replay: true,
            cookie: CookieConfig::default(),
            lifetimes: LifetimeConfig::default(),
            lockout: LockoutConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Validates the configuration for startup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or a lifetime is
    /// zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_secret.is_empty() {
            return Err(ConfigError::MissingField {
                field: "session_secret".to_string(),
            });
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::MissingField {
                field: "issuer".to_string(),
            });
        }
        if self.lifetimes.access_token.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "lifetimes.access_token".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        if self.lockout.max_attempts == 0 {
            return Err(ConfigError::InvalidField {
                field: "lockout.max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The user-facing device verification URI.
    #[must_use]
    pub fn device_verification_uri(&self) -> String {
        format!("{}/auth/device", self.base_url.trim_end_matches('/'))
    }
}

/// Session cookie scoping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,

    /// The registrable parent domain the cookie is scoped to, so sibling
    /// internal services share it. Empty means host-only.
    pub domain: String,

    /// Whether to set the `Secure` attribute. Only ever disabled in local
    /// development over plain HTTP.
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "grove_session".to_string(),
            domain: String::new(),
            secure: true,
        }
    }
}

/// Lifetimes of minted artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifetimeConfig {
    /// Access token lifetime (JWT `exp` - `iat`).
    #[serde(with = "humantime_serde")]
    pub access_token: Duration,

    /// Refresh token absolute lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token: Duration,

    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub auth_code: Duration,

    /// Magic code lifetime.
    #[serde(with = "humantime_serde")]
    pub magic_code: Duration,

    /// Pending federated-ceremony state lifetime.
    #[serde(with = "humantime_serde")]
    pub oauth_state: Duration,

    /// Device code lifetime.
    #[serde(with = "humantime_serde")]
    pub device_code: Duration,

    /// Minimum interval between device-flow token polls.
    #[serde(with = "humantime_serde")]
    pub device_poll_interval: Duration,

    /// Server-side session lifetime.
    #[serde(with = "humantime_serde")]
    pub session: Duration,
}

impl Default for LifetimeConfig {
    fn default() -> Self {
        Self {
            access_token: Duration::from_secs(3600),
            refresh_token: Duration::from_secs(30 * 24 * 3600),
            auth_code: Duration::from_secs(5 * 60),
            magic_code: Duration::from_secs(10 * 60),
            oauth_state: Duration::from_secs(10 * 60),
            device_code: Duration::from_secs(15 * 60),
            device_poll_interval: Duration::from_secs(5),
            session: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

/// Failed-attempt lockout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lock.
    pub max_attempts: u32,

    /// How long the lock lasts.
    #[serde(with = "humantime_serde")]
    pub lock_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_duration: Duration::from_secs(15 * 60),
        }
    }
}

/// Per-step timeouts for external collaborators.
///
/// Timeouts surface to the caller as `server_error` with no internal
/// detail exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// External identity provider calls (code exchange, userinfo).
    #[serde(with = "humantime_serde")]
    pub identity_provider: Duration,

    /// Magic-code email delivery.
    #[serde(with = "humantime_serde")]
    pub email: Duration,

    /// Store reads and writes.
    #[serde(with = "humantime_serde")]
    pub store: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            identity_provider: Duration::from_secs(10),
            email: Duration::from_secs(5),
            store: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> AuthConfig {
        AuthConfig {
            session_secret: "test-secret".to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_defaults_match_ceremony_contract() {
        let config = AuthConfig::default();
        assert_eq!(config.lifetimes.access_token, Duration::from_secs(3600));
        assert_eq!(
            config.lifetimes.refresh_token,
            Duration::from_secs(30 * 24 * 3600)
        );
        assert_eq!(config.lifetimes.auth_code, Duration::from_secs(300));
        assert_eq!(config.lifetimes.magic_code, Duration::from_secs(600));
        assert_eq!(config.lifetimes.device_code, Duration::from_secs(900));
        assert_eq!(config.lifetimes.device_poll_interval, Duration::from_secs(5));
        assert_eq!(config.lockout.max_attempts, 5);
        assert_eq!(config.lockout.lock_duration, Duration::from_secs(900));
        assert!(!config.public_signup);
        assert!(config.revoke_family_on_replay);
        assert_eq!(config.cookie.name, "grove_session");
        assert!(config.cookie.secure);
    }

    #[test]
    fn test_validate_requires_session_secret() {
        let config = AuthConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { field }) if field == "session_secret"
        ));
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_lifetime() {
        let mut config = minimal();
        config.lifetimes.access_token = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_device_verification_uri_strips_trailing_slash() {
        let mut config = minimal();
        config.base_url = "https://auth.grove.example/".to_string();
        assert_eq!(
            config.device_verification_uri(),
            "https://auth.grove.example/auth/device"
        );
    }

    #[test]
    fn test_humantime_deserialization() {
        let toml = r#"
            issuer = "https://id.example"
            session_secret = "s"

            [lifetimes]
            access_token = "1h"
            magic_code = "10m"
        "#;
        let config: AuthConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.lifetimes.access_token, Duration::from_secs(3600));
        assert_eq!(config.lifetimes.magic_code, Duration::from_secs(600));
        // Unspecified sections keep their defaults
        assert_eq!(config.lockout.max_attempts, 5);
    }
}
