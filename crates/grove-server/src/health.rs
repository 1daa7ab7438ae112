//! Health endpoint.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::json;

use grove_auth::http::AuthHttpState;

/// `GET /health` - component status map.
pub async fn health_handler(State(state): State<AuthHttpState>) -> impl IntoResponse {
    // The store answers a trivial read; failure marks it degraded.
    let store = match state.clients.list().await {
        Ok(_) => "ok",
        Err(_) => "degraded",
    };
    let providers = state.federation.enabled_providers().await;

    Json(json!({
        "status": if store == "ok" { "ok" } else { "degraded" },
        "timestamp": time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        "components": {
            "store": store,
            "rate_limiter_windows": state.limiter.window_count(),
            "identity_providers": providers,
        },
    }))
}
