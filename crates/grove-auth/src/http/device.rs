//! Device-flow endpoints (`/auth/device-code`, `/auth/device`,
//! `/auth/device/authorize`).
//!
//! The mint endpoint serves CLIs; the other two serve the browser. The
//! approval page requires an authenticated session and shows exactly what
//! the user is granting: which client, which account, which code.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::warn;

use crate::error::AuthError;
use crate::http::session::resolve_session;
use crate::http::{AuthHttpState, error_response, ip_key, rate_limited, request_meta};
use crate::deviceflow::normalize_user_code;
use crate::ratelimit::SCOPE_DEVICE_INIT;
use crate::types::GrantType;

const DEVICE_INIT_LIMIT: u32 = 10;
const WINDOW: Duration = Duration::from_secs(60);

/// `POST /auth/device-code` body.
#[derive(Debug, Deserialize)]
pub struct DeviceCodeRequest {
    /// Requesting client.
    pub client_id: String,
    /// Requested scope.
    #[serde(default)]
    pub scope: Option<String>,
}

/// `GET /auth/device` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct DevicePageQuery {
    /// Pre-filled user code (from `verification_uri_complete`).
    #[serde(default)]
    pub user_code: Option<String>,
    /// Set after a decision to show the closing page.
    #[serde(default)]
    pub success: Option<String>,
}

/// `POST /auth/device/authorize` form body.
#[derive(Debug, Deserialize)]
pub struct DeviceDecisionForm {
    /// The user code being decided.
    pub user_code: String,
    /// "approve" or "deny".
    pub action: String,
}

/// `POST /auth/device-code` - mint a device/user code pair.
pub async fn device_code_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    Json(request): Json<DeviceCodeRequest>,
) -> Response {
    let meta = request_meta(&headers);

    let decision = state
        .limiter
        .check(SCOPE_DEVICE_INIT, &ip_key(&meta), DEVICE_INIT_LIMIT, WINDOW);
    if !decision.allowed {
        // RFC 8628 wording for an over-eager device.
        return error_response(&AuthError::SlowDown);
    }

    let client = match state.clients.find_by_client_id(&request.client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => return error_response(&AuthError::invalid_client("unknown client")),
        Err(err) => return error_response(&err),
    };
    if !client.is_grant_type_allowed(GrantType::DeviceCode) {
        return error_response(&AuthError::invalid_client(
            "client may not use the device grant",
        ));
    }

    match state
        .device
        .mint(&client.client_id, request.scope.as_deref(), &meta)
        .await
    {
        Ok(response) => {
            state.sweeper.kick();
            Json(response).into_response()
        }
        Err(err) => {
            warn!(client_id = %client.client_id, error = %err, "device mint failed");
            error_response(&err)
        }
    }
}

/// `GET /auth/device` - the user-facing approval page.
///
/// Without a session: redirect to login, preserving the return URL in
/// `state` so the user lands back here afterwards.
pub async fn device_page_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<DevicePageQuery>,
) -> Response {
    let Some((_, user)) = resolve_session(&state, &jar).await else {
        let return_to = match &query.user_code {
            Some(code) => format!("/auth/device?user_code={code}"),
            None => "/auth/device".to_string(),
        };
        let login = format!(
            "{}/login?state={}",
            state.config.base_url.trim_end_matches('/'),
            urlencode(&return_to)
        );
        return Redirect::temporary(&login).into_response();
    };

    if let Some(outcome) = query.success.as_deref() {
        return html(StatusCode::OK, &page_decided(outcome));
    }

    let Some(user_code) = query.user_code.as_deref() else {
        return html(StatusCode::OK, &page_enter_code());
    };
    let Some(user_code) = normalize_user_code(user_code) else {
        return html(StatusCode::BAD_REQUEST, &page_error("That code is not valid."));
    };

    match state.device.pending_for_approval(&user_code).await {
        Ok(Some((record, client_name))) => html(
            StatusCode::OK,
            &page_approve(&client_name, &user.email, &record.user_code),
        ),
        Ok(None) => html(
            StatusCode::NOT_FOUND,
            &page_error("That code is unknown, expired, or already decided."),
        ),
        Err(err) => error_response(&err),
    }
}

/// `POST /auth/device/authorize` - apply the approve/deny decision.
pub async fn device_authorize_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<DeviceDecisionForm>,
) -> Response {
    let meta = request_meta(&headers);

    let Some((_, user)) = resolve_session(&state, &jar).await else {
        return error_response(&AuthError::unauthorized("sign in to decide"));
    };

    let Some(user_code) = normalize_user_code(&form.user_code) else {
        return error_response(&AuthError::invalid_request("malformed user_code"));
    };
    let approve = match form.action.as_str() {
        "approve" => true,
        "deny" => false,
        _ => return error_response(&AuthError::invalid_request("action must be approve or deny")),
    };

    match state.device.decide(&user_code, approve, &user, &meta).await {
        Ok(()) => {
            let outcome = if approve { "approved" } else { "denied" };
            Redirect::to(&format!("/auth/device?success={outcome}")).into_response()
        }
        Err(err) => error_response(&err),
    }
}

// -----------------------------------------------------------------------------
// Page rendering
// -----------------------------------------------------------------------------

const PAGE_STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:26rem;margin:4rem auto;\
padding:0 1rem;color:#1a1a1a}h1{font-size:1.25rem}code{font-size:1.6rem;letter-spacing:.2rem;\
display:block;margin:1rem 0;padding:.5rem;background:#f2f2f2;border-radius:6px;text-align:center}\
button{font-size:1rem;padding:.5rem 1.5rem;margin-right:.75rem;border-radius:6px;\
border:1px solid #888;cursor:pointer}.approve{background:#1f7a33;color:#fff;border-color:#1f7a33}";

fn html(status: StatusCode, body: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body.to_string(),
    )
        .into_response()
}

fn page_shell(title: &str, inner: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
<title>{title}</title><style>{PAGE_STYLE}</style></head><body>{inner}</body></html>"
    )
}

fn page_enter_code() -> String {
    page_shell(
        "Connect a device",
        "<h1>Connect a device</h1>\
<p>Enter the code shown on your device.</p>\
<form method=\"get\" action=\"/auth/device\">\
<input name=\"user_code\" autofocus autocomplete=\"off\" placeholder=\"XXXX-XXXX\">\
<button type=\"submit\">Continue</button></form>",
    )
}

fn page_approve(client_name: &str, user_email: &str, user_code: &str) -> String {
    let client_name = escape(client_name);
    let user_email = escape(user_email);
    page_shell(
        "Approve device",
        &format!(
            "<h1>Approve this device?</h1>\
<p><strong>{client_name}</strong> wants to sign in as <strong>{user_email}</strong>.</p>\
<code>{user_code}</code>\
<p>Only approve if this code matches the one on your device.</p>\
<form method=\"post\" action=\"/auth/device/authorize\">\
<input type=\"hidden\" name=\"user_code\" value=\"{user_code}\">\
<button class=\"approve\" name=\"action\" value=\"approve\">Approve</button>\
<button name=\"action\" value=\"deny\">Deny</button></form>"
        ),
    )
}

fn page_decided(outcome: &str) -> String {
    let message = if outcome == "approved" {
        "Device approved. You can return to your device; it will finish signing in shortly."
    } else {
        "Request denied. The device will not be signed in."
    };
    page_shell("Done", &format!("<h1>Done</h1><p>{message}</p>"))
}

fn page_error(message: &str) -> String {
    page_shell(
        "Something went wrong",
        &format!("<h1>Something went wrong</h1><p>{}</p>", escape(message)),
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
