//! Server configuration.
//!
//! Layered: built-in defaults, then an optional TOML file (path from
//! `GROVE_CONFIG`, default `grove.toml`), then `GROVE_`-prefixed
//! environment variables (`GROVE_AUTH__ISSUER`, `GROVE_LISTEN`, ...).
//! Client secrets appear in configuration as plaintext and are hashed at
//! bootstrap; only the hash reaches the store.

use serde::{Deserialize, Serialize};

use grove_auth::config::AuthConfig;
use grove_auth::federation::IdentityProviderConfig;
use grove_auth::types::GrantType;

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    /// The underlying sources failed to load or merge.
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),

    /// The merged configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] grove_auth::config::ConfigError),
}

/// A client registration as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SeedClient {
    /// OAuth client id.
    pub client_id: String,
    /// Display name.
    pub name: String,
    /// Plaintext secret; hashed before storage. Omit for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Exact redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// CORS origins.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Owning registrable domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owning_domain: Option<String>,
    /// Pre-trusted first-party service.
    #[serde(default)]
    pub is_internal_service: bool,
    /// Allowed grant types.
    pub grant_types: Vec<GrantType>,
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub listen: String,

    /// Kernel configuration.
    pub auth: AuthConfig,

    /// PEM-encoded PKCS#8 RSA private key for token signing.
    /// A fresh key is generated when absent (development only; tokens do
    /// not survive restarts without a configured key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_private_key_pem: Option<String>,

    /// External identity providers.
    pub providers: Vec<IdentityProviderConfig>,

    /// Clients to register at startup.
    pub clients: Vec<SeedClient>,

    /// Emails permitted to authenticate.
    pub allowlist: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            auth: AuthConfig::default(),
            jwt_private_key_pem: None,
            providers: Vec::new(),
            clients: Vec::new(),
            allowlist: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source fails to parse or the merged result
    /// fails validation.
    pub fn load() -> Result<Self, ServerConfigError> {
        let path = std::env::var("GROVE_CONFIG").unwrap_or_else(|_| "grove.toml".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("GROVE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.auth.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert!(config.clients.is_empty());
        assert!(config.jwt_private_key_pem.is_none());
    }

    #[test]
    fn test_toml_shape() {
        let toml = r#"
            listen = "127.0.0.1:9000"
            allowlist = ["alice@example.com"]

            [auth]
            issuer = "https://auth.grove.example"
            session_secret = "s3cret"

            [[clients]]
            client_id = "grove-web"
            name = "Grove Web"
            secret = "grove_sk_x"
            redirect_uris = ["https://app.grove.example/cb"]
            grant_types = ["authorization_code", "refresh_token"]

            [[clients]]
            client_id = "grove-cli"
            name = "Grove CLI"
            grant_types = ["device_code", "refresh_token"]

            [[providers]]
            id = "google"
            name = "Google"
            authorization_endpoint = "https://accounts.google.com/o/oauth2/v2/auth"
            token_endpoint = "https://oauth2.googleapis.com/token"
            userinfo_endpoint = "https://openidconnect.googleapis.com/v1/userinfo"
            client_id = "idp-client"
        "#;

        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.clients.len(), 2);
        assert_eq!(config.clients[1].secret, None);
        assert_eq!(
            config.clients[1].grant_types,
            vec![GrantType::DeviceCode, GrantType::RefreshToken]
        );
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.allowlist, vec!["alice@example.com"]);
        assert!(config.auth.validate().is_ok());
    }
}
