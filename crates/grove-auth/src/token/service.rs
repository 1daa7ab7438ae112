//! Grant orchestration for the token endpoint.
//!
//! [`TokenService`] drives the three grants this server supports:
//!
//! - `authorization_code`: atomic consume, byte-exact redirect comparison,
//!   mandatory PKCE, then an access/refresh pair
//! - `refresh_token`: atomic rotation; replaying a revoked token revokes
//!   the whole (user, client) family when so configured
//! - `urn:ietf:params:oauth:grant-type:device_code`: RFC 8628 polling with
//!   `authorization_pending` / `slow_down` / `access_denied` /
//!   `expired_token`
//!
//! Every code-exchange failure path returns the same `InvalidGrant` so the
//! endpoint gives callers no enumeration oracle.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use time::OffsetDateTime;

use crate::audit::{AuditEventKind, AuditLogger, RequestMeta};
use crate::deviceflow::DeviceCodeStatus;
use crate::error::AuthError;
use crate::oauth::{PkceChallenge, PkceVerifier, TokenRequest, TokenResponse};
use crate::storage::{AuthCodeStorage, DeviceCodeStorage, RefreshTokenStorage, UserStorage};
use crate::token::jwt::{AccessTokenClaims, JwtService};
use crate::token::refresh::RefreshToken;
use crate::types::{Client, GrantType, User};
use crate::AuthResult;

/// Scope granted when the ceremony did not narrow it.
pub const DEFAULT_SCOPE: &str = "openid email profile";

/// Configuration for the token service.
#[derive(Debug, Clone)]
pub struct TokenServiceConfig {
    /// Access token lifetime.
    pub access_token_lifetime: Duration,
    /// Refresh token lifetime.
    pub refresh_token_lifetime: Duration,
    /// Minimum interval between device-flow polls.
    pub device_poll_interval: Duration,
    /// Whether replaying a revoked refresh token revokes the family.
    pub revoke_family_on_replay: bool,
}

impl Default for TokenServiceConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(3600),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600),
            device_poll_interval: Duration::from_secs(5),
            revoke_family_on_replay: true,
        }
    }
}

/// Issues and rotates token pairs.
pub struct TokenService {
    jwt: Arc<JwtService>,
    codes: Arc<dyn AuthCodeStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
    users: Arc<dyn UserStorage>,
    devices: Arc<dyn DeviceCodeStorage>,
    audit: AuditLogger,
    config: TokenServiceConfig,
}

impl TokenService {
    /// Creates the service over its collaborators.
    #[must_use]
    pub fn new(
        jwt: Arc<JwtService>,
        codes: Arc<dyn AuthCodeStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
        users: Arc<dyn UserStorage>,
        devices: Arc<dyn DeviceCodeStorage>,
        audit: AuditLogger,
        config: TokenServiceConfig,
    ) -> Self {
        Self {
            jwt,
            codes,
            refresh_tokens,
            users,
            devices,
            audit,
            config,
        }
    }

    /// Exchanges an authorization code for a token pair.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for missing `code`/`redirect_uri`; `InvalidGrant`
    /// for everything the code-exchange gate rejects (unknown, expired,
    /// consumed, wrong client, wrong redirect, any PKCE failure).
    pub async fn exchange_code(
        &self,
        request: &TokenRequest,
        client: &Client,
        meta: &RequestMeta,
    ) -> AuthResult<TokenResponse> {
        if !client.is_grant_type_allowed(GrantType::AuthorizationCode) {
            return Err(AuthError::unauthorized("grant type not allowed for client"));
        }

        let code = request
            .code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("missing code"))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("missing redirect_uri"))?;

        // Atomic one-time consume; every failure cause is the same `None`.
        let Some(row) = self.codes.consume(code, &client.client_id).await? else {
            return Err(AuthError::InvalidGrant);
        };

        // The consume excludes expired rows, but reads re-verify anyway.
        if row.is_expired() {
            return Err(AuthError::InvalidGrant);
        }

        // Redirect binding is byte-for-byte.
        if row.redirect_uri != redirect_uri {
            return Err(AuthError::InvalidGrant);
        }

        // PKCE is mandatory: a row without a challenge is unexchangeable,
        // and a request without a verifier never passes.
        let (Some(challenge), Some(method)) =
            (row.code_challenge.as_deref(), row.code_challenge_method.as_deref())
        else {
            return Err(AuthError::InvalidGrant);
        };
        if method != "S256" {
            return Err(AuthError::InvalidGrant);
        }
        let Some(verifier) = request.code_verifier.as_deref() else {
            return Err(AuthError::InvalidGrant);
        };
        let verifier =
            PkceVerifier::new(verifier.to_string()).map_err(|_| AuthError::InvalidGrant)?;
        let challenge = PkceChallenge::new(challenge.to_string())
            .map_err(|_| AuthError::InvalidGrant)?;
        challenge
            .verify(&verifier)
            .map_err(|_| AuthError::InvalidGrant)?;

        let Some(user) = self.users.find_by_id(row.user_id).await? else {
            return Err(AuthError::InvalidGrant);
        };

        let response = self.issue_pair(&user, &client.client_id, &row.scope).await?;

        self.audit.emit(
            AuditEventKind::TokenExchange,
            Some(user.id),
            Some(&client.client_id),
            meta,
            json!({"grant": "authorization_code"}),
        );

        Ok(response)
    }

    /// Rotates a refresh token.
    ///
    /// The presented token is revoked and a new pair issued atomically
    /// against concurrent uses: of two refreshes racing on one token,
    /// exactly one wins. Replay of an already-revoked token is treated as
    /// a theft signal and, when configured, revokes every refresh token
    /// for that (user, client).
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for a missing token, `InvalidGrant` otherwise.
    pub async fn refresh(
        &self,
        request: &TokenRequest,
        client: &Client,
        meta: &RequestMeta,
    ) -> AuthResult<TokenResponse> {
        if !client.is_grant_type_allowed(GrantType::RefreshToken) {
            return Err(AuthError::unauthorized("grant type not allowed for client"));
        }

        let token = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("missing refresh_token"))?;
        let hash = RefreshToken::hash_token(token);

        let Some(record) = self.refresh_tokens.find_by_hash(&hash).await? else {
            return Err(AuthError::InvalidGrant);
        };

        if record.client_id != client.client_id {
            return Err(AuthError::InvalidGrant);
        }

        if record.is_revoked() {
            // Replay of a rotated-away token: someone holds a stolen copy.
            if self.config.revoke_family_on_replay {
                let revoked = self
                    .refresh_tokens
                    .revoke_family(record.user_id, &client.client_id)
                    .await?;
                tracing::warn!(
                    client_id = %client.client_id,
                    revoked,
                    "revoked refresh token replayed; family revoked"
                );
                self.audit.emit(
                    AuditEventKind::TokenRevoke,
                    Some(record.user_id),
                    Some(&client.client_id),
                    meta,
                    json!({"reason": "refresh_replay", "revoked": revoked}),
                );
            }
            return Err(AuthError::InvalidGrant);
        }

        if record.is_expired() {
            return Err(AuthError::InvalidGrant);
        }

        // The rotation point: conditional revoke, one winner.
        let Some(record) = self.refresh_tokens.revoke_if_active(&hash).await? else {
            return Err(AuthError::InvalidGrant);
        };

        let Some(user) = self.users.find_by_id(record.user_id).await? else {
            return Err(AuthError::InvalidGrant);
        };

        let response = self.issue_pair(&user, &client.client_id, &record.scope).await?;

        self.audit.emit(
            AuditEventKind::TokenRefresh,
            Some(user.id),
            Some(&client.client_id),
            meta,
            json!({}),
        );

        Ok(response)
    }

    /// Revokes a refresh token (RFC 7009).
    ///
    /// Succeeds for any authenticated caller whether or not the token was
    /// live, known, or theirs; a token belonging to a different client is
    /// left untouched but still reported as revoked.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure.
    pub async fn revoke(
        &self,
        token: &str,
        client: &Client,
        meta: &RequestMeta,
    ) -> AuthResult<()> {
        let hash = RefreshToken::hash_token(token);

        if let Some(record) = self.refresh_tokens.find_by_hash(&hash).await?
            && record.client_id == client.client_id
        {
            self.refresh_tokens.revoke(&hash).await?;
            self.audit.emit(
                AuditEventKind::TokenRevoke,
                Some(record.user_id),
                Some(&client.client_id),
                meta,
                json!({"reason": "client_request"}),
            );
        }

        Ok(())
    }

    /// Services a device-flow token poll (RFC 8628 §3.4-3.5).
    ///
    /// # Errors
    ///
    /// - `AuthorizationPending` while the user has not decided
    /// - `SlowDown` when polled faster than the advertised interval
    /// - `AccessDenied` when the user denied
    /// - `ExpiredToken` when the pair expired
    /// - `InvalidGrant` for an unknown device code or wrong client
    pub async fn device_exchange(
        &self,
        request: &TokenRequest,
        client: &Client,
        meta: &RequestMeta,
    ) -> AuthResult<TokenResponse> {
        if !client.is_grant_type_allowed(GrantType::DeviceCode) {
            return Err(AuthError::unauthorized("grant type not allowed for client"));
        }

        let device_code = request
            .device_code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("missing device_code"))?;
        let hash = crate::crypto::sha256_hex(device_code);

        let Some(record) = self.devices.find_by_device_hash(&hash).await? else {
            return Err(AuthError::InvalidGrant);
        };
        if record.client_id != client.client_id {
            return Err(AuthError::InvalidGrant);
        }

        if record.is_expired() && !matches!(record.status, DeviceCodeStatus::Authorized) {
            return Err(AuthError::ExpiredToken);
        }

        // Poll pacing before anything else: an impatient CLI backs off
        // whatever state the record is in.
        let previous_poll = self.devices.mark_polled(&hash).await?;
        if let Some(previous) = previous_poll {
            let elapsed = OffsetDateTime::now_utc() - previous;
            if elapsed < self.config.device_poll_interval {
                return Err(AuthError::SlowDown);
            }
        }

        match record.status {
            DeviceCodeStatus::Pending => Err(AuthError::AuthorizationPending),
            DeviceCodeStatus::Denied => {
                Err(AuthError::access_denied("the user denied the request"))
            }
            DeviceCodeStatus::Expired => Err(AuthError::ExpiredToken),
            DeviceCodeStatus::Authorized => {
                // Atomic take: one of two racing polls gets the record.
                let Some(record) = self.devices.take_authorized(&hash).await? else {
                    return Err(AuthError::InvalidGrant);
                };
                let Some(user_id) = record.user_id else {
                    return Err(AuthError::InvalidGrant);
                };
                let Some(user) = self.users.find_by_id(user_id).await? else {
                    return Err(AuthError::InvalidGrant);
                };

                let response =
                    self.issue_pair(&user, &client.client_id, &record.scope).await?;

                self.audit.emit(
                    AuditEventKind::TokenExchange,
                    Some(user.id),
                    Some(&client.client_id),
                    meta,
                    json!({"grant": "device_code"}),
                );

                Ok(response)
            }
        }
    }

    /// Mints an access token and a stored refresh token for a user.
    async fn issue_pair(
        &self,
        user: &User,
        client_id: &str,
        scope: &str,
    ) -> AuthResult<TokenResponse> {
        let scope = if scope.is_empty() { DEFAULT_SCOPE } else { scope };

        let claims = AccessTokenClaims::new(
            user.id,
            &user.email,
            &user.name,
            client_id,
            self.jwt.issuer(),
            self.config.access_token_lifetime,
        );
        let access_token = self
            .jwt
            .encode(&claims)
            .map_err(|e| AuthError::internal(format!("token signing failed: {e}")))?;

        let refresh_value = RefreshToken::generate_token();
        let record = RefreshToken::issue(
            &refresh_value,
            client_id,
            user.id,
            scope,
            self.config.refresh_token_lifetime,
        );
        self.refresh_tokens.create(&record).await?;

        Ok(TokenResponse::new(
            access_token,
            self.config.access_token_lifetime.as_secs(),
            scope.to_string(),
        )
        .with_refresh_token(refresh_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::AuthorizationCode;
    use crate::testutil::TestBackend;
    use std::sync::OnceLock;
    use uuid::Uuid;

    fn jwt() -> Arc<JwtService> {
        static KEYS: OnceLock<crate::token::SigningKeyPair> = OnceLock::new();
        let keys = KEYS.get_or_init(|| crate::token::SigningKeyPair::generate().unwrap());
        Arc::new(JwtService::new(keys, "https://auth.grove.example").unwrap())
    }

    struct Fixture {
        backend: Arc<TestBackend>,
        service: TokenService,
        client: Client,
        user: User,
    }

    async fn fixture() -> Fixture {
        let backend = Arc::new(TestBackend::new());
        let client = backend.seed_client("grove-web", "grove_sk_test").await;
        let user = backend.seed_user("alice@example.com").await;

        let service = TokenService::new(
            jwt(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            AuditLogger::new(backend.clone()),
            TokenServiceConfig::default(),
        );

        Fixture {
            backend,
            service,
            client,
            user,
        }
    }

    fn pkce_pair() -> (String, String) {
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier);
        (verifier.as_str().to_string(), challenge.into_inner())
    }

    async fn mint_code(
        fx: &Fixture,
        challenge: Option<String>,
        redirect: &str,
    ) -> AuthorizationCode {
        let code = AuthorizationCode::mint(
            &fx.client.client_id,
            fx.user.id,
            redirect,
            challenge,
            Some("S256".to_string()),
            DEFAULT_SCOPE,
            Duration::from_secs(300),
        );
        fx.backend.create_code(&code).await;
        code
    }

    fn exchange_request(code: &str, redirect: &str, verifier: Option<&str>) -> TokenRequest {
        TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: Some(code.to_string()),
            redirect_uri: Some(redirect.to_string()),
            code_verifier: verifier.map(str::to_string),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            device_code: None,
            scope: None,
        }
    }

    fn refresh_request(token: &str) -> TokenRequest {
        TokenRequest {
            grant_type: "refresh_token".to_string(),
            code: None,
            redirect_uri: None,
            code_verifier: None,
            client_id: None,
            client_secret: None,
            refresh_token: Some(token.to_string()),
            device_code: None,
            scope: None,
        }
    }

    const REDIRECT: &str = "https://app.grove.example/callback";

    #[tokio::test]
    async fn test_exchange_happy_path() {
        let fx = fixture().await;
        let (verifier, challenge) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;

        let response = fx
            .service
            .exchange_code(
                &exchange_request(&code.code, REDIRECT, Some(&verifier)),
                &fx.client,
                &RequestMeta::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.scope, DEFAULT_SCOPE);

        // The access token verifies and carries the contract claims.
        let claims = jwt().decode(&response.access_token).unwrap();
        assert_eq!(claims.sub, fx.user.id.to_string());
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.client_id, "grove-web");
        assert_eq!(claims.exp, claims.iat + 3600);

        assert_eq!(response.refresh_token.unwrap().len(), 43);
    }

    #[tokio::test]
    async fn test_exchange_is_single_use() {
        let fx = fixture().await;
        let (verifier, challenge) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;
        let request = exchange_request(&code.code, REDIRECT, Some(&verifier));

        assert!(
            fx.service
                .exchange_code(&request, &fx.client, &RequestMeta::default())
                .await
                .is_ok()
        );
        assert!(matches!(
            fx.service
                .exchange_code(&request, &fx.client, &RequestMeta::default())
                .await,
            Err(AuthError::InvalidGrant)
        ));
    }

    #[tokio::test]
    async fn test_exchange_requires_pkce() {
        let fx = fixture().await;

        // Missing verifier
        let (_, challenge) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;
        assert!(matches!(
            fx.service
                .exchange_code(
                    &exchange_request(&code.code, REDIRECT, None),
                    &fx.client,
                    &RequestMeta::default()
                )
                .await,
            Err(AuthError::InvalidGrant)
        ));

        // Row minted without a challenge is unexchangeable
        let (verifier, _) = pkce_pair();
        let code = mint_code(&fx, None, REDIRECT).await;
        assert!(matches!(
            fx.service
                .exchange_code(
                    &exchange_request(&code.code, REDIRECT, Some(&verifier)),
                    &fx.client,
                    &RequestMeta::default()
                )
                .await,
            Err(AuthError::InvalidGrant)
        ));

        // Wrong verifier
        let (_, challenge) = pkce_pair();
        let (other_verifier, _) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;
        assert!(matches!(
            fx.service
                .exchange_code(
                    &exchange_request(&code.code, REDIRECT, Some(&other_verifier)),
                    &fx.client,
                    &RequestMeta::default()
                )
                .await,
            Err(AuthError::InvalidGrant)
        ));
    }

    #[tokio::test]
    async fn test_exchange_redirect_binding() {
        let fx = fixture().await;
        let (verifier, challenge) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;

        let result = fx
            .service
            .exchange_code(
                &exchange_request(&code.code, "https://app.grove.example/other", Some(&verifier)),
                &fx.client,
                &RequestMeta::default(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant)));
    }

    #[tokio::test]
    async fn test_exchange_client_binding() {
        let fx = fixture().await;
        let other_client = fx.backend.seed_client("grove-other", "grove_sk_other").await;
        let (verifier, challenge) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;

        let result = fx
            .service
            .exchange_code(
                &exchange_request(&code.code, REDIRECT, Some(&verifier)),
                &other_client,
                &RequestMeta::default(),
            )
            .await;
        assert!(matches!(result, Err(AuthError::InvalidGrant)));
    }

    #[tokio::test]
    async fn test_refresh_rotation() {
        let fx = fixture().await;
        let (verifier, challenge) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;

        let first = fx
            .service
            .exchange_code(
                &exchange_request(&code.code, REDIRECT, Some(&verifier)),
                &fx.client,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        let old_refresh = first.refresh_token.unwrap();

        // Rotation succeeds and yields a different token.
        let second = fx
            .service
            .refresh(&refresh_request(&old_refresh), &fx.client, &RequestMeta::default())
            .await
            .unwrap();
        let new_refresh = second.refresh_token.unwrap();
        assert_ne!(old_refresh, new_refresh);

        // The old token is dead.
        assert!(matches!(
            fx.service
                .refresh(&refresh_request(&old_refresh), &fx.client, &RequestMeta::default())
                .await,
            Err(AuthError::InvalidGrant)
        ));

        // The new one works exactly once more.
        assert!(
            fx.service
                .refresh(&refresh_request(&new_refresh), &fx.client, &RequestMeta::default())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_refresh_replay_revokes_family() {
        let fx = fixture().await;
        let (verifier, challenge) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;

        let first = fx
            .service
            .exchange_code(
                &exchange_request(&code.code, REDIRECT, Some(&verifier)),
                &fx.client,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        let stolen = first.refresh_token.unwrap();

        let rotated = fx
            .service
            .refresh(&refresh_request(&stolen), &fx.client, &RequestMeta::default())
            .await
            .unwrap();
        let current = rotated.refresh_token.unwrap();

        // The thief replays the rotated-away token...
        assert!(matches!(
            fx.service
                .refresh(&refresh_request(&stolen), &fx.client, &RequestMeta::default())
                .await,
            Err(AuthError::InvalidGrant)
        ));

        // ...which takes the legitimate holder's token down with it.
        assert!(matches!(
            fx.service
                .refresh(&refresh_request(&current), &fx.client, &RequestMeta::default())
                .await,
            Err(AuthError::InvalidGrant)
        ));
    }

    #[tokio::test]
    async fn test_refresh_wrong_client() {
        let fx = fixture().await;
        let other_client = fx.backend.seed_client("grove-other", "grove_sk_other").await;
        let (verifier, challenge) = pkce_pair();
        let code = mint_code(&fx, Some(challenge), REDIRECT).await;

        let pair = fx
            .service
            .exchange_code(
                &exchange_request(&code.code, REDIRECT, Some(&verifier)),
                &fx.client,
                &RequestMeta::default(),
            )
            .await
            .unwrap();
        let refresh = pair.refresh_token.unwrap();

        assert!(matches!(
            fx.service
                .refresh(&refresh_request(&refresh), &other_client, &RequestMeta::default())
                .await,
            Err(AuthError::InvalidGrant)
        ));

        // Not consumed by the failed attempt.
        assert!(
            fx.service
                .refresh(&refresh_request(&refresh), &fx.client, &RequestMeta::default())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_revoke_is_quiet_about_unknown_tokens() {
        let fx = fixture().await;
        assert!(
            fx.service
                .revoke("never-issued", &fx.client, &RequestMeta::default())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_device_exchange_lifecycle() {
        let fx = fixture().await;
        let cli = fx.backend.seed_device_client("grove-cli").await;

        let device_code = crate::crypto::generate_token();
        let hash = crate::crypto::sha256_hex(&device_code);
        fx.backend
            .seed_device_record(&hash, "BCDF-GHJK", "grove-cli")
            .await;

        let request = TokenRequest {
            grant_type: GrantType::DeviceCode.as_str().to_string(),
            code: None,
            redirect_uri: None,
            code_verifier: None,
            client_id: Some("grove-cli".to_string()),
            client_secret: None,
            refresh_token: None,
            device_code: Some(device_code.clone()),
            scope: None,
        };

        // Pending while the user has not decided.
        assert!(matches!(
            fx.service
                .device_exchange(&request, &cli, &RequestMeta::default())
                .await,
            Err(AuthError::AuthorizationPending)
        ));

        // An immediate second poll is pacing abuse.
        assert!(matches!(
            fx.service
                .device_exchange(&request, &cli, &RequestMeta::default())
                .await,
            Err(AuthError::SlowDown)
        ));

        // Approve, clear pacing, poll again: a token pair.
        fx.backend
            .decide("BCDF-GHJK", DeviceCodeStatus::Authorized, Some(fx.user.id))
            .await;
        fx.backend.clear_poll(&hash).await;

        let response = fx
            .service
            .device_exchange(&request, &cli, &RequestMeta::default())
            .await
            .unwrap();
        assert!(response.refresh_token.is_some());

        // The record was taken; replaying the device code finds nothing.
        fx.backend.clear_poll(&hash).await;
        assert!(matches!(
            fx.service
                .device_exchange(&request, &cli, &RequestMeta::default())
                .await,
            Err(AuthError::InvalidGrant)
        ));
    }

    #[tokio::test]
    async fn test_device_exchange_denied() {
        let fx = fixture().await;
        let cli = fx.backend.seed_device_client("grove-cli").await;

        let device_code = crate::crypto::generate_token();
        let hash = crate::crypto::sha256_hex(&device_code);
        fx.backend
            .seed_device_record(&hash, "MNPQ-RSTV", "grove-cli")
            .await;
        fx.backend
            .decide("MNPQ-RSTV", DeviceCodeStatus::Denied, Some(fx.user.id))
            .await;

        let request = TokenRequest {
            grant_type: GrantType::DeviceCode.as_str().to_string(),
            code: None,
            redirect_uri: None,
            code_verifier: None,
            client_id: Some("grove-cli".to_string()),
            client_secret: None,
            refresh_token: None,
            device_code: Some(device_code),
            scope: None,
        };

        assert!(matches!(
            fx.service
                .device_exchange(&request, &cli, &RequestMeta::default())
                .await,
            Err(AuthError::AccessDenied { .. })
        ));
    }
}
