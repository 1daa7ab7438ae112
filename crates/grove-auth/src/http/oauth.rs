//! Federated sign-in endpoints (`/oauth/{provider}`,
//! `/oauth/{provider}/callback`).
//!
//! The start endpoint validates (client, redirect_uri) and bounces the
//! user to the external provider with an internal state token. The
//! callback finishes the ceremony: a browser session is opened either
//! way, then ordinary clients get an authorization-code redirect while
//! internal services ride on the freshly set cookie.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::warn;

use crate::error::AuthError;
use crate::federation::{CallbackOutcome, StartAuthRequest};
use crate::http::session::session_cookie;
use crate::http::{AuthHttpState, error_response, request_meta};
use crate::session::{NewSession, device_fingerprint, device_name_from_user_agent};
use crate::types::User;

/// `GET /oauth/{provider}` query parameters.
#[derive(Debug, Deserialize)]
pub struct StartQuery {
    /// Requesting client.
    pub client_id: String,
    /// Where to send the user afterwards.
    pub redirect_uri: String,
    /// Client CSRF state, echoed back at the end.
    #[serde(default)]
    pub state: Option<String>,
    /// PKCE challenge for the eventual authorization code.
    #[serde(default)]
    pub code_challenge: Option<String>,
    /// PKCE challenge method; only "S256" is accepted.
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// `GET /oauth/{provider}/callback` query parameters.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code from the provider.
    #[serde(default)]
    pub code: Option<String>,
    /// Our internal state token, round-tripped through the provider.
    #[serde(default)]
    pub state: Option<String>,
    /// Provider-reported error, if the dialog failed.
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /oauth/{provider}` - start federated sign-in.
pub async fn oauth_start_handler(
    State(state): State<AuthHttpState>,
    Path(provider): Path<String>,
    Query(query): Query<StartQuery>,
) -> Response {
    let client = match state.clients.find_by_client_id(&query.client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return oauth_error(&AuthError::invalid_client("unknown client"));
        }
        Err(err) => return error_response(&err),
    };

    if !client.is_redirect_uri_allowed(&query.redirect_uri) {
        return oauth_error(&AuthError::invalid_request("unregistered redirect_uri"));
    }
    if let Some(method) = query.code_challenge_method.as_deref()
        && method != "S256"
    {
        return oauth_error(&AuthError::invalid_request(
            "unsupported code_challenge_method",
        ));
    }

    let request = StartAuthRequest {
        redirect_uri: query.redirect_uri,
        state: query.state,
        code_challenge: query.code_challenge,
        code_challenge_method: query.code_challenge_method,
    };

    match state.federation.start(&provider, &client, &request).await {
        Ok(authorize_url) => Redirect::temporary(&authorize_url).into_response(),
        Err(err) => oauth_error(&err),
    }
}

/// `GET /oauth/{provider}/callback` - finish federated sign-in.
pub async fn oauth_callback_handler(
    State(state): State<AuthHttpState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let meta = request_meta(&headers);

    // Provider-reported failure: pass error + state back to the client.
    if let Some(provider_error) = query.error.as_deref() {
        let Some(ceremony_state) = query.state.as_deref() else {
            return oauth_error(&AuthError::InvalidState);
        };
        return match state
            .federation
            .callback_error(ceremony_state, provider_error)
            .await
        {
            Ok(redirect) => Redirect::temporary(&redirect).into_response(),
            Err(err) => oauth_error(&err),
        };
    }

    let (Some(code), Some(ceremony_state)) = (query.code.as_deref(), query.state.as_deref())
    else {
        return oauth_error(&AuthError::invalid_request("missing code or state"));
    };

    let outcome = match state
        .federation
        .callback(&provider, code, ceremony_state, &meta)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(provider = %provider, error_code = err.error_code(), "callback failed");
            return oauth_error(&err);
        }
    };

    state.sweeper.kick();

    match outcome {
        CallbackOutcome::CodeIssued { redirect, user }
        | CallbackOutcome::CookieIssued { redirect, user } => {
            let jar = open_browser_session(&state, jar, &user, &meta).await;
            (jar, Redirect::temporary(&redirect)).into_response()
        }
        CallbackOutcome::ErrorRedirect { redirect } => {
            Redirect::temporary(&redirect).into_response()
        }
    }
}

/// Records a device session for the authenticated browser and sets the
/// encrypted session cookie.
async fn open_browser_session(
    state: &AuthHttpState,
    jar: CookieJar,
    user: &User,
    meta: &crate::audit::RequestMeta,
) -> CookieJar {
    let session = state
        .sessions
        .create(
            user.id,
            NewSession {
                fingerprint: device_fingerprint(meta.user_agent.as_deref(), meta.ip.as_deref()),
                device_name: device_name_from_user_agent(meta.user_agent.as_deref()),
                ip: meta.ip.clone(),
                user_agent: meta.user_agent.clone(),
            },
        )
        .await;

    jar.add(session_cookie(state, session.id, user.id))
}

/// The OAuth start/callback endpoints report `invalid_client` as 400.
fn oauth_error(err: &AuthError) -> Response {
    if matches!(err, AuthError::InvalidClient { .. }) {
        let mut response = error_response(err);
        *response.status_mut() = axum::http::StatusCode::BAD_REQUEST;
        return response;
    }
    error_response(err)
}
