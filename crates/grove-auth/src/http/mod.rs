//! Axum handlers for every ceremony endpoint.
//!
//! # Endpoints
//!
//! - [`token`] - `/token`, `/token/refresh`, `/token/revoke`
//! - [`magic`] - `/magic/send`, `/magic/verify`
//! - [`device`] - `/auth/device-code`, `/auth/device`, `/auth/device/authorize`
//! - [`oauth`] - `/oauth/{provider}`, `/oauth/{provider}/callback`
//! - [`session`] - `/session/validate|revoke|revoke-all|list|validate-service`
//!
//! Handlers own: rate limiting, client authentication, cookie handling,
//! and the error envelope. Ceremony semantics live in the engines.

pub mod device;
pub mod magic;
pub mod oauth;
pub mod session;
pub mod token;

use std::sync::Arc;

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::audit::{AuditLogger, RequestMeta};
use crate::config::AuthConfig;
use crate::crypto::SessionCookieCodec;
use crate::deviceflow::DeviceFlowService;
use crate::error::AuthError;
use crate::federation::FederationService;
use crate::magic::MagicCodeService;
use crate::ratelimit::RateLimiter;
use crate::session::SessionStore;
use crate::storage::{
    AllowlistStorage, AuthCodeStorage, ClientStorage, DeviceCodeStorage, MagicCodeStorage,
    OAuthStateStorage, UserStorage,
};
use crate::token::TokenService;

/// Shared state for all auth endpoints.
#[derive(Clone)]
pub struct AuthHttpState {
    /// Kernel configuration.
    pub config: AuthConfig,
    /// Fixed-window rate limiter.
    pub limiter: Arc<RateLimiter>,
    /// Session cookie codec.
    pub cookies: Arc<SessionCookieCodec>,
    /// Per-user session shards.
    pub sessions: Arc<SessionStore>,
    /// Grant orchestration.
    pub tokens: Arc<TokenService>,
    /// Magic-code engine.
    pub magic: Arc<MagicCodeService>,
    /// Device-flow engine.
    pub device: Arc<DeviceFlowService>,
    /// Federated login adapter.
    pub federation: Arc<FederationService>,
    /// Client registrations.
    pub clients: Arc<dyn ClientStorage>,
    /// User records.
    pub users: Arc<dyn UserStorage>,
    /// The email allowlist.
    pub allowlist: Arc<dyn AllowlistStorage>,
    /// Audit emitter.
    pub audit: AuditLogger,
    /// Stores with expirable rows, for opportunistic sweeps.
    pub sweeper: Sweeper,
}

/// Handles fire-and-forget expiry sweeps.
///
/// Triggered opportunistically after ceremony operations; correctness
/// never depends on a sweep having run.
#[derive(Clone)]
pub struct Sweeper {
    auth_codes: Arc<dyn AuthCodeStorage>,
    magic_codes: Arc<dyn MagicCodeStorage>,
    oauth_states: Arc<dyn OAuthStateStorage>,
    device_codes: Arc<dyn DeviceCodeStorage>,
}

impl Sweeper {
    /// Creates a sweeper over the expirable stores.
    #[must_use]
    pub fn new(
        auth_codes: Arc<dyn AuthCodeStorage>,
        magic_codes: Arc<dyn MagicCodeStorage>,
        oauth_states: Arc<dyn OAuthStateStorage>,
        device_codes: Arc<dyn DeviceCodeStorage>,
    ) -> Self {
        Self {
            auth_codes,
            magic_codes,
            oauth_states,
            device_codes,
        }
    }

    /// Spawns a background pass over every expirable store.
    pub fn kick(&self) {
        let sweeper = self.clone();
        tokio::spawn(async move {
            let _ = sweeper.auth_codes.cleanup_expired().await;
            let _ = sweeper.magic_codes.cleanup_expired().await;
            let _ = sweeper.oauth_states.cleanup_expired().await;
            let _ = sweeper.device_codes.cleanup_expired().await;
        });
    }
}

/// Extracts request provenance from proxy-aware headers.
///
/// `X-Forwarded-For` may carry `client, proxy1, proxy2`; the first entry
/// is the original client. `X-Real-IP` is the nginx convention.
#[must_use]
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    RequestMeta::new(ip, user_agent)
}

/// The IP key used for rate limiting; absent IPs share one bucket.
#[must_use]
pub fn ip_key(meta: &RequestMeta) -> String {
    meta.ip.clone().unwrap_or_else(|| "unknown".to_string())
}

/// Renders an error as the sanitized wire envelope.
///
/// Server-side causes collapse to `server_error` with no internal detail;
/// `account_locked` carries `locked_until` and the throttling errors carry
/// `retry_after`.
#[must_use]
pub fn error_response(err: &AuthError) -> Response {
    let status = StatusCode::from_u16(err.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut body = json!({ "error": err.error_code() });
    match err {
        AuthError::AccountLocked { locked_until } => {
            body["locked_until"] = json!(
                locked_until
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default()
            );
        }
        AuthError::RateLimited { retry_after } => {
            body["retry_after"] = json!(retry_after);
        }
        AuthError::SlowDown => {
            body["error_description"] = json!("polling faster than the advertised interval");
        }
        err if err.is_client_error() => {
            // Client errors may carry their description; server errors
            // never leak detail.
            let text = err.to_string();
            if let Some((_, detail)) = text.split_once(": ") {
                body["error_description"] = json!(detail);
            }
        }
        _ => {}
    }

    if err.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }

    (status, Json(body)).into_response()
}

/// Maps a rate-limit denial to the wire error.
#[must_use]
pub fn rate_limited(decision: &crate::ratelimit::RateDecision) -> AuthError {
    AuthError::RateLimited {
        retry_after: decision.retry_after.as_secs().max(1),
    }
}
