//! Startup bootstrap: seed clients, providers, and the allowlist.
//!
//! Registration is out-of-band by design; this is the band. Secrets come
//! in as plaintext configuration values and leave as Argon2 hashes.

use grove_auth::AuthResult;
use grove_auth::crypto::hash_secret;
use grove_auth::error::AuthError;
use grove_auth::http::AuthHttpState;
use grove_auth::types::Client;

use crate::config::ServerConfig;

/// Seeds the stores from configuration.
///
/// # Errors
///
/// Returns an error if a seed client is invalid or a store write fails.
pub async fn bootstrap(state: &AuthHttpState, config: &ServerConfig) -> AuthResult<()> {
    for seed in &config.clients {
        let secret_hash = match &seed.secret {
            Some(secret) => Some(
                hash_secret(secret)
                    .map_err(|e| AuthError::configuration(format!("client secret: {e}")))?,
            ),
            None => None,
        };

        let client = Client {
            client_id: seed.client_id.clone(),
            name: seed.name.clone(),
            secret_hash,
            redirect_uris: seed.redirect_uris.clone(),
            allowed_origins: seed.allowed_origins.clone(),
            owning_domain: seed.owning_domain.clone(),
            is_internal_service: seed.is_internal_service,
            grant_types: seed.grant_types.clone(),
        };
        state.clients.create(&client).await?;
        tracing::info!(client_id = %client.client_id, "registered client");
    }

    for provider in &config.providers {
        state.federation.register_provider(provider.clone()).await;
    }

    for email in &config.allowlist {
        state.allowlist.add(email).await?;
    }
    if !config.allowlist.is_empty() {
        tracing::info!(entries = config.allowlist.len(), "seeded allowlist");
    }

    Ok(())
}
