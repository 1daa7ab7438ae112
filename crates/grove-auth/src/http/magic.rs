//! Magic-code endpoints (`/magic/send`, `/magic/verify`).
//!
//! JSON bodies. `/magic/send` is the anti-enumeration surface: once the
//! client and redirect check out and the rate limits admit the request,
//! the response body is the same whether or not a code was actually
//! generated.

use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::AuthError;
use crate::http::{AuthHttpState, error_response, ip_key, rate_limited, request_meta};
use crate::magic::MagicVerifyRequest;
use crate::ratelimit::{SCOPE_MAGIC_EMAIL, SCOPE_MAGIC_IP, SCOPE_VERIFY};
use crate::types::Client;

const WINDOW: Duration = Duration::from_secs(60);
const SEND_IP_LIMIT: u32 = 10;
const SEND_EMAIL_LIMIT: u32 = 3;
const VERIFY_LIMIT: u32 = 100;

/// `POST /magic/send` body.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Where to send the code.
    pub email: String,
    /// Requesting client.
    pub client_id: String,
    /// Redirect URI the eventual verify will target.
    pub redirect_uri: String,
}

/// `POST /magic/verify` body.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Email the code was sent to.
    pub email: String,
    /// The six digits as typed.
    pub code: String,
    /// Requesting client.
    pub client_id: String,
    /// Redirect URI to carry the authorization code back on.
    pub redirect_uri: String,
    /// Client state, echoed back on the redirect.
    #[serde(default)]
    pub state: Option<String>,
    /// PKCE challenge for the minted authorization code.
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE challenge method.
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// `POST /magic/send`.
///
/// The uniform body prevents email enumeration: allowed, unknown, and
/// locked addresses are indistinguishable on the wire.
pub async fn magic_send_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    Json(request): Json<SendRequest>,
) -> Response {
    let meta = request_meta(&headers);

    // IP window first, then the narrower per-email window.
    let decision = state
        .limiter
        .check(SCOPE_MAGIC_IP, &ip_key(&meta), SEND_IP_LIMIT, WINDOW);
    if !decision.allowed {
        return error_response(&rate_limited(&decision));
    }
    let email_key = request.email.to_lowercase();
    let decision = state
        .limiter
        .check(SCOPE_MAGIC_EMAIL, &email_key, SEND_EMAIL_LIMIT, WINDOW);
    if !decision.allowed {
        return error_response(&rate_limited(&decision));
    }

    let client = match validated_client(&state, &request.client_id, &request.redirect_uri).await
    {
        Ok(client) => client,
        Err(err) => return magic_error(&err),
    };

    if let Err(err) = state.magic.send(&request.email, &client, &meta).await {
        // Storage trouble is the one thing that may break the uniform
        // response; it carries no per-email information.
        warn!(error = %err, "magic send failed");
        return magic_error(&err);
    }

    state.sweeper.kick();

    Json(json!({
        "success": true,
        "message": "If that address can sign in, a code is on its way."
    }))
    .into_response()
}

/// `POST /magic/verify`.
pub async fn magic_verify_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> Response {
    let meta = request_meta(&headers);

    let decision = state
        .limiter
        .check(SCOPE_VERIFY, &ip_key(&meta), VERIFY_LIMIT, WINDOW);
    if !decision.allowed {
        return error_response(&rate_limited(&decision));
    }

    let client = match validated_client(&state, &request.client_id, &request.redirect_uri).await
    {
        Ok(client) => client,
        Err(err) => return magic_error(&err),
    };

    let verify = MagicVerifyRequest {
        email: request.email,
        code: request.code,
        redirect_uri: request.redirect_uri,
        state: request.state,
        code_challenge: request.code_challenge,
        code_challenge_method: request.code_challenge_method,
    };

    match state.magic.verify(&verify, &client, &meta).await {
        Ok(redirect_uri) => Json(json!({
            "success": true,
            "redirect_uri": redirect_uri,
        }))
        .into_response(),
        Err(err) => magic_error(&err),
    }
}

/// Resolves and validates (client, redirect_uri) for the magic endpoints.
async fn validated_client(
    state: &AuthHttpState,
    client_id: &str,
    redirect_uri: &str,
) -> Result<Client, AuthError> {
    let client = state
        .clients
        .find_by_client_id(client_id)
        .await?
        .ok_or_else(|| AuthError::invalid_client("unknown client"))?;

    if !client.is_redirect_uri_allowed(redirect_uri) {
        return Err(AuthError::invalid_request("unregistered redirect_uri"));
    }

    Ok(client)
}

/// Error envelope for the magic endpoints: `invalid_client` is 400 here,
/// not the token endpoints' 401.
fn magic_error(err: &AuthError) -> Response {
    if matches!(err, AuthError::InvalidClient { .. }) {
        let mut response = error_response(err);
        *response.status_mut() = axum::http::StatusCode::BAD_REQUEST;
        return response;
    }
    error_response(err)
}
