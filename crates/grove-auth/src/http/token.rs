//! Token endpoint handlers (`/token`, `/token/refresh`, `/token/revoke`).
//!
//! Bodies are form-encoded. Clients authenticate with HTTP Basic or with
//! `client_id` + `client_secret` in the body; public clients present only
//! their `client_id`. The rate-limit window is keyed on `IP:client_id` so
//! neither one IP nor one client can exhaust the other's budget.

use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::http::{AuthHttpState, error_response, ip_key, rate_limited, request_meta};
use crate::oauth::TokenRequest;
use crate::ratelimit::SCOPE_TOKEN;
use crate::types::{Client, GrantType};

/// Requests admitted per `IP:client_id` per window.
const TOKEN_RATE_LIMIT: u32 = 20;
/// The token window.
const TOKEN_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Revocation request body (RFC 7009).
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// The refresh token to revoke.
    pub token: String,
    /// Client ID.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// `POST /token` - grant dispatch.
pub async fn token_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    handle_token(state, headers, request).await
}

/// `POST /token/refresh` - alias that pins `grant_type=refresh_token`.
pub async fn token_refresh_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    Form(mut request): Form<TokenRequest>,
) -> Response {
    request.grant_type = GrantType::RefreshToken.as_str().to_string();
    handle_token(state, headers, request).await
}

async fn handle_token(
    state: AuthHttpState,
    headers: HeaderMap,
    request: TokenRequest,
) -> Response {
    let meta = request_meta(&headers);

    let client = match authenticate_client(
        &state,
        &headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )
    .await
    {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %err, "client authentication failed");
            return error_response(&err);
        }
    };

    // IP:client_id keying (never client alone).
    let subject = format!("{}:{}", ip_key(&meta), client.client_id);
    let decision = state
        .limiter
        .check(SCOPE_TOKEN, &subject, TOKEN_RATE_LIMIT, TOKEN_RATE_WINDOW);
    if !decision.allowed {
        return error_response(&rate_limited(&decision));
    }

    debug!(
        client_id = %client.client_id,
        grant_type = %request.grant_type,
        "processing token request"
    );

    let result = match request.grant_type.as_str() {
        "authorization_code" => state.tokens.exchange_code(&request, &client, &meta).await,
        "refresh_token" => state.tokens.refresh(&request, &client, &meta).await,
        "urn:ietf:params:oauth:grant-type:device_code" => {
            state.tokens.device_exchange(&request, &client, &meta).await
        }
        other => Err(AuthError::unsupported_grant_type(other)),
    };

    state.sweeper.kick();

    match result {
        Ok(response) => Json(response).into_response(),
        Err(err) => {
            warn!(
                client_id = %client.client_id,
                grant_type = %request.grant_type,
                error_code = err.error_code(),
                "token request failed"
            );
            error_response(&err)
        }
    }
}

/// `POST /token/revoke` - RFC 7009 revocation.
///
/// Always `{success: true}` for an authenticated caller, whatever the
/// token's state was.
pub async fn token_revoke_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    Form(request): Form<RevokeRequest>,
) -> Response {
    let meta = request_meta(&headers);

    let client = match authenticate_client(
        &state,
        &headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )
    .await
    {
        Ok(client) => client,
        Err(err) => return error_response(&err),
    };

    match state.tokens.revoke(&request.token, &client, &meta).await {
        Ok(()) => Json(json!({"success": true})).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Authenticates the calling client from Basic auth or body credentials.
///
/// Confidential clients must present the right secret; public clients
/// (no stored hash) authenticate by `client_id` alone. Secret comparison
/// goes through the constant-time Argon2 verifier.
pub(crate) async fn authenticate_client(
    state: &AuthHttpState,
    headers: &HeaderMap,
    body_client_id: Option<&str>,
    body_client_secret: Option<&str>,
) -> Result<Client, AuthError> {
    let (client_id, client_secret) = match basic_auth(headers) {
        Some((id, secret)) => (id, Some(secret)),
        None => (
            body_client_id
                .ok_or_else(|| AuthError::invalid_client("missing client_id"))?
                .to_string(),
            body_client_secret.map(str::to_string),
        ),
    };

    let client = state
        .clients
        .find_by_client_id(&client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("unknown client"))?;

    if client.secret_hash.is_some() {
        let secret = client_secret
            .ok_or_else(|| AuthError::invalid_client("missing client_secret"))?;
        if !client.verify_secret(&secret) {
            return Err(AuthError::invalid_client("invalid client_secret"));
        }
    }

    Ok(client)
}

/// Parses an `Authorization: Basic` header into `(client_id, secret)`.
fn basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get("authorization")?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_parsing() {
        let mut headers = HeaderMap::new();
        let encoded =
            base64::engine::general_purpose::STANDARD.encode("grove-web:grove_sk_secret");
        headers.insert(
            "authorization",
            format!("Basic {encoded}").parse().unwrap(),
        );

        let (id, secret) = basic_auth(&headers).unwrap();
        assert_eq!(id, "grove-web");
        assert_eq!(secret, "grove_sk_secret");
    }

    #[test]
    fn test_basic_auth_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer token".parse().unwrap());
        assert!(basic_auth(&headers).is_none());
        assert!(basic_auth(&HeaderMap::new()).is_none());
    }
}
