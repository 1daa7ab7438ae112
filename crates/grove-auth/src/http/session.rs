//! Session endpoints (`/session/*`).
//!
//! All of these authenticate through the encrypted `grove_session` cookie
//! except `/session/validate-service`, which takes the cookie value in a
//! JSON body (internal services forward it server-to-server).

use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::audit::AuditEventKind;
use crate::error::AuthError;
use crate::http::{AuthHttpState, error_response, ip_key, rate_limited, request_meta};
use crate::ratelimit::{SCOPE_SESSION, SCOPE_SESSION_REVOKE_ALL};
use crate::session::SessionRecord;
use crate::types::User;

const WINDOW: Duration = Duration::from_secs(60);
const SESSION_LIMIT: u32 = 100;
const REVOKE_ALL_LIMIT: u32 = 3;
const REVOKE_ALL_WINDOW: Duration = Duration::from_secs(3600);

/// `POST /session/revoke-all` body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeAllRequest {
    /// Keep the session making the request.
    #[serde(default)]
    pub keep_current: bool,
}

/// `POST /session/validate-service` body.
#[derive(Debug, Deserialize)]
pub struct ValidateServiceRequest {
    /// The session cookie value as forwarded by an internal service.
    pub session_token: String,
}

/// `POST /session/validate`.
///
/// Cookie-authenticated; `{valid:false}` for missing, tampered, revoked,
/// and expired sessions alike.
pub async fn session_validate_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Some(response) = check_session_rate(&state, &headers) {
        return response;
    }

    match resolve_session(&state, &jar).await {
        Some((session, user)) => Json(json!({
            "valid": true,
            "user": user_view(&user),
            "session": session_view(&session, true),
        }))
        .into_response(),
        None => Json(json!({"valid": false})).into_response(),
    }
}

/// `POST /session/revoke`.
///
/// Revokes the calling session and clears the cookie.
pub async fn session_revoke_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Some(response) = check_session_rate(&state, &headers) {
        return response;
    }

    let Some((session, user)) = resolve_session(&state, &jar).await else {
        return error_response(&AuthError::unauthorized("no valid session"));
    };

    state.sessions.revoke(user.id, session.id).await;
    state.audit.emit(
        AuditEventKind::Logout,
        Some(user.id),
        None,
        &request_meta(&headers),
        json!({"session": session.id}),
    );

    let jar = jar.remove(removal_cookie(&state));
    (jar, Json(json!({"success": true}))).into_response()
}

/// `POST /session/revoke-all`.
pub async fn session_revoke_all_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Option<Json<RevokeAllRequest>>,
) -> Response {
    let meta = request_meta(&headers);
    let decision = state.limiter.check(
        SCOPE_SESSION_REVOKE_ALL,
        &ip_key(&meta),
        REVOKE_ALL_LIMIT,
        REVOKE_ALL_WINDOW,
    );
    if !decision.allowed {
        return error_response(&rate_limited(&decision));
    }

    let Some((session, user)) = resolve_session(&state, &jar).await else {
        return error_response(&AuthError::unauthorized("no valid session"));
    };

    let keep_current = body.map(|Json(b)| b.keep_current).unwrap_or(false);
    let keep = keep_current.then_some(session.id);
    let revoked = state.sessions.revoke_all(user.id, keep).await;

    state.audit.emit(
        AuditEventKind::Logout,
        Some(user.id),
        None,
        &meta,
        json!({"revoked": revoked, "kept_current": keep_current}),
    );

    if keep_current {
        (jar, Json(json!({"success": true, "revokedCount": revoked}))).into_response()
    } else {
        let jar = jar.remove(removal_cookie(&state));
        (jar, Json(json!({"success": true, "revokedCount": revoked}))).into_response()
    }
}

/// `GET /session/list`.
pub async fn session_list_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if let Some(response) = check_session_rate(&state, &headers) {
        return response;
    }

    let Some((current, user)) = resolve_session(&state, &jar).await else {
        return error_response(&AuthError::unauthorized("no valid session"));
    };

    let sessions: Vec<_> = state
        .sessions
        .list(user.id)
        .await
        .iter()
        .map(|s| session_view(s, s.id == current.id))
        .collect();

    Json(json!({"sessions": sessions})).into_response()
}

/// `POST /session/validate-service`.
///
/// Internal services forward the raw cookie value; the response carries
/// the user and session for their own bookkeeping.
pub async fn session_validate_service_handler(
    State(state): State<AuthHttpState>,
    headers: HeaderMap,
    body: Option<Json<ValidateServiceRequest>>,
) -> Response {
    if let Some(response) = check_session_rate(&state, &headers) {
        return response;
    }

    let Some(Json(request)) = body else {
        return error_response(&AuthError::invalid_request("missing session_token"));
    };

    let Some(payload) = state.cookies.open(&request.session_token) else {
        return error_response(&AuthError::unauthorized("invalid session token"));
    };
    let Some(session) = state
        .sessions
        .validate(payload.user_id, payload.session_id)
        .await
    else {
        return error_response(&AuthError::unauthorized("session not found"));
    };
    let Ok(Some(user)) = state.users.find_by_id(payload.user_id).await else {
        return error_response(&AuthError::unauthorized("user not found"));
    };

    Json(json!({
        "valid": true,
        "user": user_view(&user),
        "session": session_view(&session, false),
    }))
    .into_response()
}

/// Builds the session cookie for a freshly created session.
#[must_use]
pub fn session_cookie(state: &AuthHttpState, session_id: Uuid, user_id: Uuid) -> Cookie<'static> {
    let mut cookie = Cookie::new(
        state.config.cookie.name.clone(),
        state.cookies.seal(session_id, user_id),
    );
    cookie.set_http_only(true);
    cookie.set_secure(state.config.cookie.secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    if !state.config.cookie.domain.is_empty() {
        cookie.set_domain(state.config.cookie.domain.clone());
    }
    cookie
}

/// Opens the cookie and validates the referenced session.
pub(crate) async fn resolve_session(
    state: &AuthHttpState,
    jar: &CookieJar,
) -> Option<(SessionRecord, User)> {
    let cookie = jar.get(&state.config.cookie.name)?;
    let payload = state.cookies.open(cookie.value())?;
    let session = state
        .sessions
        .validate(payload.user_id, payload.session_id)
        .await?;
    let user = state.users.find_by_id(payload.user_id).await.ok()??;
    Some((session, user))
}

fn check_session_rate(state: &AuthHttpState, headers: &HeaderMap) -> Option<Response> {
    let meta = request_meta(headers);
    let decision = state
        .limiter
        .check(SCOPE_SESSION, &ip_key(&meta), SESSION_LIMIT, WINDOW);
    if decision.allowed {
        None
    } else {
        Some(error_response(&rate_limited(&decision)))
    }
}

fn removal_cookie(state: &AuthHttpState) -> Cookie<'static> {
    let mut cookie = Cookie::new(state.config.cookie.name.clone(), "");
    cookie.set_path("/");
    if !state.config.cookie.domain.is_empty() {
        cookie.set_domain(state.config.cookie.domain.clone());
    }
    cookie
}

fn user_view(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
        "avatarUrl": user.avatar_url,
        "isAdmin": user.is_admin,
    })
}

fn session_view(session: &SessionRecord, is_current: bool) -> serde_json::Value {
    json!({
        "id": session.id,
        "deviceName": session.device_name,
        "ip": session.ip,
        "createdAt": session.created_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        "lastActiveAt": session.last_active_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        "isCurrent": is_current,
    })
}
