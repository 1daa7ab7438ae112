//! External identity provider configuration.
//!
//! Providers are configured with explicit endpoints rather than OIDC
//! discovery; the three URLs below are the whole capability surface the
//! adapter needs.
//!
//! # Example
//!
//! ```
//! use grove_auth::federation::IdentityProviderConfig;
//!
//! let google = IdentityProviderConfig::new(
//!     "google",
//!     "Google",
//!     "https://accounts.google.com/o/oauth2/v2/auth",
//!     "https://oauth2.googleapis.com/token",
//!     "https://openidconnect.googleapis.com/v1/userinfo",
//!     "server-client-id",
//! )
//! .with_client_secret("server-client-secret");
//! assert!(google.enabled);
//! ```

use serde::{Deserialize, Serialize};

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

/// Configuration for one external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    /// Unique identifier, used in the `/oauth/{provider}` path.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// The provider's authorization endpoint.
    pub authorization_endpoint: String,

    /// The provider's token endpoint.
    pub token_endpoint: String,

    /// The provider's userinfo endpoint.
    pub userinfo_endpoint: String,

    /// Our client ID registered with the provider.
    pub client_id: String,

    /// Our client secret registered with the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Scopes to request.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Whether this provider may be used.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl IdentityProviderConfig {
    /// Creates a provider configuration with required fields.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        userinfo_endpoint: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            userinfo_endpoint: userinfo_endpoint.into(),
            client_id: client_id.into(),
            client_secret: None,
            scopes: default_scopes(),
            enabled: true,
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Replaces the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether the provider is enabled.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The scope string for the authorize URL.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let provider = IdentityProviderConfig::new(
            "github",
            "GitHub",
            "https://github.com/login/oauth/authorize",
            "https://github.com/login/oauth/access_token",
            "https://api.github.com/user",
            "cid",
        );
        assert!(provider.enabled);
        assert_eq!(provider.scope_param(), "openid email profile");
        assert!(provider.client_secret.is_none());
    }

    #[test]
    fn test_builders() {
        let provider = IdentityProviderConfig::new("g", "G", "a", "t", "u", "cid")
            .with_client_secret("cs")
            .with_scopes(vec!["openid", "email"])
            .with_enabled(false);
        assert_eq!(provider.client_secret.as_deref(), Some("cs"));
        assert_eq!(provider.scope_param(), "openid email");
        assert!(!provider.enabled);
    }

    #[test]
    fn test_toml_deserialization_fills_defaults() {
        let toml = r#"
            id = "google"
            name = "Google"
            authorization_endpoint = "https://a"
            token_endpoint = "https://t"
            userinfo_endpoint = "https://u"
            client_id = "cid"
        "#;
        let provider: IdentityProviderConfig = toml::from_str(toml).unwrap();
        assert!(provider.enabled);
        assert_eq!(provider.scopes.len(), 3);
    }
}
