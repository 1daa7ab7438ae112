//! The federated login adapter.
//!
//! Pre-redirect: validate, persist the pending ceremony, send the user to
//! the provider. Callback: consume the state row (single use), exchange
//! the code server-to-server, read userinfo, apply the allowlist, upsert
//! the user, and hand the HTTP layer either an authorization-code
//! redirect or an internal-service cookie instruction.
//!
//! ```text
//! IDLE -> REDIRECTED_TO_IDP -> CALLBACK_RECEIVED ->
//!   { USER_ACCEPTED -> USER_MATERIALIZED -> CODE_ISSUED | COOKIE_ISSUED }
//!   { USER_REJECTED_BY_ALLOWLIST -> ERROR_REDIRECT }
//!   { CALLBACK_ERROR -> ERROR_REDIRECT }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

use crate::audit::{AuditEventKind, AuditLogger, RequestMeta};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::federation::{FederatedIdentity, IdentityProviderConfig};
use crate::oauth::{AuthorizationCode, OAuthState};
use crate::storage::{
    AllowlistStorage, AuthCodeStorage, ClientStorage, OAuthStateStorage, UserStorage,
};
use crate::types::{Client, User};
use crate::AuthResult;

/// Parameters of a `/oauth/{provider}` start request.
#[derive(Debug, Clone)]
pub struct StartAuthRequest {
    /// Redirect URI to eventually send the user back to.
    pub redirect_uri: String,
    /// The client's own state parameter.
    pub state: Option<String>,
    /// The client's PKCE challenge.
    pub code_challenge: Option<String>,
    /// The client's PKCE challenge method.
    pub code_challenge_method: Option<String>,
}

/// What the callback resolved to; the HTTP layer renders it.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Ordinary client: redirect back with `code` and `state`.
    CodeIssued {
        /// The fully built redirect URL.
        redirect: String,
        /// The user, for session bookkeeping.
        user: User,
    },
    /// Internal service: set the session cookie, redirect with just `state`.
    CookieIssued {
        /// The redirect URL carrying only the client state.
        redirect: String,
        /// The user to open a session for.
        user: User,
    },
    /// The ceremony failed in a way the client should hear about:
    /// redirect back with `error` and `state` (RFC 6749 §4.1.2.1).
    ErrorRedirect {
        /// The redirect URL carrying `error` and the client state.
        redirect: String,
    },
}

/// Token response from the external provider's token endpoint.
#[derive(Debug, Deserialize)]
struct ProviderTokens {
    access_token: String,
}

/// Drives the external-IdP dialog.
pub struct FederationService {
    providers: RwLock<HashMap<String, IdentityProviderConfig>>,
    states: Arc<dyn OAuthStateStorage>,
    auth_codes: Arc<dyn AuthCodeStorage>,
    users: Arc<dyn UserStorage>,
    allowlist: Arc<dyn AllowlistStorage>,
    clients: Arc<dyn ClientStorage>,
    audit: AuditLogger,
    http: reqwest::Client,
    config: AuthConfig,
}

impl FederationService {
    /// Creates the adapter over its collaborators.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the HTTP client cannot be built.
    pub fn new(
        states: Arc<dyn OAuthStateStorage>,
        auth_codes: Arc<dyn AuthCodeStorage>,
        users: Arc<dyn UserStorage>,
        allowlist: Arc<dyn AllowlistStorage>,
        clients: Arc<dyn ClientStorage>,
        audit: AuditLogger,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.identity_provider)
            .build()
            .map_err(|e| AuthError::configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            providers: RwLock::new(HashMap::new()),
            states,
            auth_codes,
            users,
            allowlist,
            clients,
            audit,
            http,
            config,
        })
    }

    /// Registers an identity provider.
    pub async fn register_provider(&self, provider: IdentityProviderConfig) {
        tracing::info!(provider = %provider.id, "registered identity provider");
        self.providers
            .write()
            .await
            .insert(provider.id.clone(), provider);
    }

    /// Lists enabled provider ids (for the health endpoint).
    pub async fn enabled_providers(&self) -> Vec<String> {
        self.providers
            .read()
            .await
            .values()
            .filter(|p| p.enabled)
            .map(|p| p.id.clone())
            .collect()
    }

    /// Starts a federated sign-in: persists the pending ceremony and
    /// returns the provider authorize URL to redirect the user to.
    ///
    /// The caller has already validated (client, redirect_uri).
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an unknown or disabled provider.
    pub async fn start(
        &self,
        provider_id: &str,
        client: &Client,
        request: &StartAuthRequest,
    ) -> AuthResult<String> {
        let provider = self.enabled_provider(provider_id).await?;

        let mut row = OAuthState::new(
            provider_id,
            &client.client_id,
            &request.redirect_uri,
            self.config.lifetimes.oauth_state,
        );
        if let Some(state) = &request.state {
            row = row.with_client_state(state);
        }
        if let (Some(challenge), Some(method)) =
            (&request.code_challenge, &request.code_challenge_method)
        {
            row = row.with_code_challenge(challenge, method);
        }
        self.states.create(&row).await?;

        let mut url = Url::parse(&provider.authorization_endpoint)
            .map_err(|_| AuthError::configuration("provider authorization endpoint"))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &provider.client_id)
            .append_pair("redirect_uri", &self.callback_url(provider_id))
            .append_pair("scope", &provider.scope_param())
            .append_pair("state", &row.state);

        Ok(url.into())
    }

    /// Handles a successful provider callback.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the state row is unknown, expired, or replayed
    /// - `AccessDenied` if the email is not permitted
    /// - `IdentityProvider` if the code exchange or userinfo fetch fails
    pub async fn callback(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
        meta: &RequestMeta,
    ) -> AuthResult<CallbackOutcome> {
        let provider = self.enabled_provider(provider_id).await?;

        // Single-use: the row is gone after this whatever else happens.
        let Some(row) = self.states.consume(state).await? else {
            return Err(AuthError::InvalidState);
        };
        if row.provider != provider_id {
            return Err(AuthError::InvalidState);
        }

        let tokens = self.exchange_code(&provider, code).await?;
        let userinfo = self.fetch_userinfo(&provider, &tokens.access_token).await?;

        let Some(identity) = FederatedIdentity::from_userinfo(provider_id, &userinfo) else {
            return Err(AuthError::identity_provider(
                provider_id,
                "userinfo response lacked email or subject",
            ));
        };

        if !self.config.public_signup && !self.allowlist.contains(&identity.email).await? {
            self.audit.emit(
                AuditEventKind::FailedLogin,
                None,
                Some(&row.client_id),
                meta,
                json!({"method": "federated", "provider": provider_id, "reason": "not_allowlisted"}),
            );
            let redirect = append_query(
                &row.redirect_uri,
                &[
                    ("error", Some("access_denied")),
                    ("state", row.client_state.as_deref()),
                ],
            )?;
            return Ok(CallbackOutcome::ErrorRedirect { redirect });
        }

        let user = self.materialize_user(&identity).await?;

        self.audit.emit(
            AuditEventKind::Login,
            Some(user.id),
            Some(&row.client_id),
            meta,
            json!({"method": "federated", "provider": provider_id}),
        );

        // Internal services share the cookie domain; everyone else gets a
        // code to exchange.
        let is_internal = self
            .clients
            .find_by_client_id(&row.client_id)
            .await?
            .map(|c| c.is_internal_service)
            .unwrap_or(false);
        if is_internal {
            let redirect = append_query(&row.redirect_uri, &[("state", row.client_state.as_deref())])?;
            return Ok(CallbackOutcome::CookieIssued { redirect, user });
        }

        let auth_code = AuthorizationCode::mint(
            &row.client_id,
            user.id,
            &row.redirect_uri,
            row.code_challenge.clone(),
            row.code_challenge_method.clone(),
            "openid email profile",
            self.config.lifetimes.auth_code,
        );
        self.auth_codes.create(&auth_code).await?;

        let redirect = append_query(
            &row.redirect_uri,
            &[
                ("code", Some(auth_code.code.as_str())),
                ("state", row.client_state.as_deref()),
            ],
        )?;

        Ok(CallbackOutcome::CodeIssued { redirect, user })
    }

    /// Handles a provider-reported error callback (RFC 6749 §4.1.2.1).
    ///
    /// Consumes the state row and returns the client redirect carrying
    /// `error` and the client's `state`.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the state row is unknown, expired, or replayed.
    pub async fn callback_error(
        &self,
        state: &str,
        provider_error: &str,
    ) -> AuthResult<String> {
        let Some(row) = self.states.consume(state).await? else {
            return Err(AuthError::InvalidState);
        };
        append_query(
            &row.redirect_uri,
            &[
                ("error", Some(provider_error)),
                ("state", row.client_state.as_deref()),
            ],
        )
    }

    async fn enabled_provider(&self, provider_id: &str) -> AuthResult<IdentityProviderConfig> {
        let providers = self.providers.read().await;
        providers
            .get(provider_id)
            .filter(|p| p.enabled)
            .cloned()
            .ok_or_else(|| AuthError::invalid_request("unknown provider"))
    }

    /// Server-to-server code exchange with the external provider.
    async fn exchange_code(
        &self,
        provider: &IdentityProviderConfig,
        code: &str,
    ) -> AuthResult<ProviderTokens> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.callback_url(&provider.id)),
            ("client_id", provider.client_id.clone()),
        ];
        if let Some(secret) = &provider.client_secret {
            form.push(("client_secret", secret.clone()));
        }

        let response = self
            .http
            .post(&provider.token_endpoint)
            .header("accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::identity_provider(&provider.id, format!("token exchange: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::identity_provider(
                &provider.id,
                format!("token endpoint returned {}", response.status()),
            ));
        }

        response
            .json::<ProviderTokens>()
            .await
            .map_err(|e| AuthError::identity_provider(&provider.id, format!("token response: {e}")))
    }

    /// Fetches identity claims with the provider access token.
    async fn fetch_userinfo(
        &self,
        provider: &IdentityProviderConfig,
        access_token: &str,
    ) -> AuthResult<serde_json::Value> {
        let response = self
            .http
            .get(&provider.userinfo_endpoint)
            .bearer_auth(access_token)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::identity_provider(&provider.id, format!("userinfo: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::identity_provider(
                &provider.id,
                format!("userinfo endpoint returned {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::identity_provider(&provider.id, format!("userinfo body: {e}")))
    }

    /// Creates or refreshes the local user from a federated identity.
    async fn materialize_user(&self, identity: &FederatedIdentity) -> AuthResult<User> {
        let user = match self.users.find_by_email(&identity.email).await? {
            Some(mut existing) => {
                existing.refresh_profile(&identity.name, identity.avatar.as_deref());
                existing
            }
            None => {
                let mut user = User::new(&identity.email, &identity.name, &identity.provider);
                if let Some(avatar) = &identity.avatar {
                    user.avatar_url = Some(avatar.clone());
                }
                user
            }
        };
        self.users.upsert(user).await
    }

    fn callback_url(&self, provider_id: &str) -> String {
        format!(
            "{}/oauth/{provider_id}/callback",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

/// Appends query pairs to a URL, skipping absent values.
fn append_query(base: &str, pairs: &[(&str, Option<&str>)]) -> AuthResult<String> {
    let mut url =
        Url::parse(base).map_err(|_| AuthError::invalid_request("malformed redirect_uri"))?;
    let mut appended = false;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            if let Some(value) = value {
                query.append_pair(key, value);
                appended = true;
            }
        }
    }
    if !appended && url.query() == Some("") {
        url.set_query(None);
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_query() {
        let url = append_query(
            "https://app.grove.example/cb",
            &[("code", Some("AC")), ("state", Some("S"))],
        )
        .unwrap();
        assert_eq!(url, "https://app.grove.example/cb?code=AC&state=S");

        let url = append_query("https://app.grove.example/cb", &[("state", None)]).unwrap();
        assert_eq!(url, "https://app.grove.example/cb");
    }
}
