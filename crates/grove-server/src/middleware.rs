//! HTTP middleware: request ids, security headers, dynamic CORS.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use grove_auth::http::AuthHttpState;

/// Ensures each request has an `x-request-id` and mirrors it on the
/// response. An incoming id is preserved; otherwise one is generated.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    let req_id = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .expect("UUID strings are valid header values")
        });

    req.extensions_mut().insert(req_id.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id);
    res
}

/// Applies the security headers every response carries.
///
/// Pages under `/auth/device` get a CSP that still allows the inline
/// styles and form posts of the approval page; everything else is JSON
/// and gets the deny-everything policy.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let is_html_page = req.uri().path().starts_with("/auth/device")
        && req.method() == Method::GET;

    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    headers.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );

    let csp = if is_html_page {
        "default-src 'none'; style-src 'unsafe-inline'; form-action 'self'; base-uri 'none'"
    } else {
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'"
    };
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static(csp),
    );

    res
}

/// Dynamic per-client CORS.
///
/// `Access-Control-Allow-Origin` is set only when the request origin is
/// registered to some client, and then always echoes that origin; a
/// wildcard is never combined with credentials. Preflights answer with
/// methods and headers only unless the origin matches.
pub async fn dynamic_cors(
    State(state): State<AuthHttpState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = req
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let allowed_origin = match &origin {
        Some(origin) => state
            .clients
            .find_by_origin(origin)
            .await
            .ok()
            .flatten()
            .map(|_| origin.clone()),
        None => None,
    };

    let is_preflight = req.method() == Method::OPTIONS;

    let mut res = if is_preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let headers = res.headers_mut();
    if is_preflight {
        headers.insert(
            HeaderName::from_static("access-control-allow-methods"),
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            HeaderName::from_static("access-control-allow-headers"),
            HeaderValue::from_static("authorization, content-type"),
        );
        headers.insert(
            HeaderName::from_static("access-control-max-age"),
            HeaderValue::from_static("600"),
        );
    }

    if let Some(origin) = allowed_origin
        && let Ok(value) = HeaderValue::from_str(&origin)
    {
        headers.insert(HeaderName::from_static("access-control-allow-origin"), value);
        headers.insert(
            HeaderName::from_static("access-control-allow-credentials"),
            HeaderValue::from_static("true"),
        );
        headers.insert(
            HeaderName::from_static("vary"),
            HeaderValue::from_static("Origin"),
        );
    }

    res
}
