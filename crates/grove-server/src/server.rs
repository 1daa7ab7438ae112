//! Router and server assembly.
//!
//! `build_state` wires the storage backend, crypto services, and engines
//! together; `build_router` mounts the ceremony endpoints and the
//! middleware stack; [`ServerBuilder`] drives both plus bootstrap and
//! the listener.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use grove_auth::AuthResult;
use grove_auth::audit::AuditLogger;
use grove_auth::crypto::SessionCookieCodec;
use grove_auth::deviceflow::DeviceFlowService;
use grove_auth::error::AuthError;
use grove_auth::federation::FederationService;
use grove_auth::http::{AuthHttpState, Sweeper, device, magic, oauth, session, token};
use grove_auth::magic::{LogMailer, MagicCodeMailer, MagicCodeService};
use grove_auth::ratelimit::RateLimiter;
use grove_auth::session::SessionStore;
use grove_auth::token::{JwtService, SigningKeyPair, TokenService, TokenServiceConfig};
use grove_auth_memory::{
    MemoryAllowlistStorage, MemoryAuditStorage, MemoryAuthCodeStorage, MemoryClientStorage,
    MemoryDeviceCodeStorage, MemoryFailedAttemptStorage, MemoryMagicCodeStorage,
    MemoryOAuthStateStorage, MemoryRefreshTokenStorage, MemoryUserStorage,
};

use crate::bootstrap::bootstrap;
use crate::config::ServerConfig;
use crate::health::health_handler;
use crate::middleware as app_middleware;

/// Builds the shared handler state over the in-memory backend.
///
/// # Errors
///
/// Returns an error if the signing key or configuration is unusable.
pub fn build_state(config: &ServerConfig) -> AuthResult<AuthHttpState> {
    build_state_with_mailer(config, Arc::new(LogMailer))
}

/// Builds the handler state with a custom mailer (tests inject capture
/// mailers here).
///
/// # Errors
///
/// Returns an error if the signing key or configuration is unusable.
pub fn build_state_with_mailer(
    config: &ServerConfig,
    mailer: Arc<dyn MagicCodeMailer>,
) -> AuthResult<AuthHttpState> {
    config
        .auth
        .validate()
        .map_err(|e| AuthError::configuration(e.to_string()))?;
    let auth = config.auth.clone();

    // Storage backend.
    let clients = Arc::new(MemoryClientStorage::new());
    let users = Arc::new(MemoryUserStorage::new());
    let allowlist = Arc::new(MemoryAllowlistStorage::new());
    let auth_codes = Arc::new(MemoryAuthCodeStorage::new());
    let refresh_tokens = Arc::new(MemoryRefreshTokenStorage::new());
    let magic_codes = Arc::new(MemoryMagicCodeStorage::new());
    let oauth_states = Arc::new(MemoryOAuthStateStorage::new());
    let device_codes = Arc::new(MemoryDeviceCodeStorage::new());
    let failed_attempts = Arc::new(MemoryFailedAttemptStorage::new());
    let audit_storage = Arc::new(MemoryAuditStorage::new());

    let audit = AuditLogger::new(audit_storage);

    // Process-lifetime key material.
    let key_pair = match &config.jwt_private_key_pem {
        Some(pem) => SigningKeyPair::from_private_pem(pem)
            .map_err(|e| AuthError::configuration(format!("jwt key: {e}")))?,
        None => {
            tracing::warn!("no JWT key configured; generating an ephemeral one");
            SigningKeyPair::generate()
                .map_err(|e| AuthError::configuration(format!("jwt keygen: {e}")))?
        }
    };
    let jwt = Arc::new(
        JwtService::new(&key_pair, auth.issuer.clone())
            .map_err(|e| AuthError::configuration(format!("jwt service: {e}")))?,
    );
    let cookies = Arc::new(SessionCookieCodec::new(auth.session_secret.as_bytes()));

    // Engines.
    let tokens = Arc::new(TokenService::new(
        jwt,
        auth_codes.clone(),
        refresh_tokens.clone(),
        users.clone(),
        device_codes.clone(),
        audit.clone(),
        TokenServiceConfig {
            access_token_lifetime: auth.lifetimes.access_token,
            refresh_token_lifetime: auth.lifetimes.refresh_token,
            device_poll_interval: auth.lifetimes.device_poll_interval,
            revoke_family_on_replay: auth.revoke_family_on_replay,
        },
    ));

    let magic = Arc::new(MagicCodeService::new(
        magic_codes.clone(),
        auth_codes.clone(),
        users.clone(),
        allowlist.clone(),
        failed_attempts.clone(),
        mailer,
        audit.clone(),
        auth.clone(),
    ));

    let device = Arc::new(DeviceFlowService::new(
        device_codes.clone(),
        clients.clone(),
        allowlist.clone(),
        audit.clone(),
        auth.clone(),
    ));

    let federation = Arc::new(FederationService::new(
        oauth_states.clone(),
        auth_codes.clone(),
        users.clone(),
        allowlist.clone(),
        clients.clone(),
        audit.clone(),
        auth.clone(),
    )?);

    let sessions = Arc::new(SessionStore::new(auth.lifetimes.session));

    Ok(AuthHttpState {
        config: auth,
        limiter: Arc::new(RateLimiter::new()),
        cookies,
        sessions,
        tokens,
        magic,
        device,
        federation,
        clients,
        users,
        allowlist,
        audit,
        sweeper: Sweeper::new(auth_codes, magic_codes, oauth_states, device_codes),
    })
}

/// Mounts every ceremony endpoint plus `/health` and the middleware
/// stack.
pub fn build_router(state: AuthHttpState) -> Router {
    Router::new()
        .route("/token", post(token::token_handler))
        .route("/token/refresh", post(token::token_refresh_handler))
        .route("/token/revoke", post(token::token_revoke_handler))
        .route("/magic/send", post(magic::magic_send_handler))
        .route("/magic/verify", post(magic::magic_verify_handler))
        .route("/auth/device-code", post(device::device_code_handler))
        .route("/auth/device", get(device::device_page_handler))
        .route(
            "/auth/device/authorize",
            post(device::device_authorize_handler),
        )
        .route("/oauth/{provider}", get(oauth::oauth_start_handler))
        .route(
            "/oauth/{provider}/callback",
            get(oauth::oauth_callback_handler),
        )
        .route("/session/validate", post(session::session_validate_handler))
        .route("/session/revoke", post(session::session_revoke_handler))
        .route(
            "/session/revoke-all",
            post(session::session_revoke_all_handler),
        )
        .route("/session/list", get(session::session_list_handler))
        .route(
            "/session/validate-service",
            post(session::session_validate_service_handler),
        )
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::dynamic_cors,
        ))
        .layer(middleware::from_fn(app_middleware::security_headers))
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds and runs the server.
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a builder from loaded configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Loads configuration from file and environment.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or validation fails.
    pub fn from_env() -> Result<Self, crate::config::ServerConfigError> {
        Ok(Self::new(ServerConfig::load()?))
    }

    /// Builds state, seeds the stores, and serves until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error on configuration, bootstrap, bind, or serve
    /// failure.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let state = build_state(&self.config)?;
        bootstrap(&state, &self.config).await?;

        let router = build_router(state);
        let listener = tokio::net::TcpListener::bind(&self.config.listen).await?;
        tracing::info!(listen = %self.config.listen, "grove-auth listening");

        axum::serve(listener, router).await?;
        Ok(())
    }
}
