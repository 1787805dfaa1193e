// handlers/public/health.rs - liveness endpoints for both services
//
// Registered ahead of the token gate so they answer without credentials.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::server::auth::AuthState;
use crate::server::inventory::InventoryState;

fn up_down<E>(result: Result<(), E>) -> &'static str {
    if result.is_ok() {
        "up"
    } else {
        "down"
    }
}

fn respond(live: bool, data: serde_json::Value) -> (StatusCode, Json<serde_json::Value>) {
    let status = if live { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(json!({ "success": live, "data": data })))
}

/// GET /auth/health
pub async fn auth_health(State(state): State<AuthState>) -> impl IntoResponse {
    let cache = up_down(state.secrets.ping().await);
    let database = up_down(state.users.ping().await);
    let secret = if state.service.secret().is_ready() { "ready" } else { "pending" };
    let live = cache == "up" && database == "up" && secret == "ready";

    respond(
        live,
        json!({
            "status": if live { "live" } else { "unhealthy" },
            "timestamp": chrono::Utc::now(),
            "cache": cache,
            "database": database,
            "secret": secret,
        }),
    )
}

/// GET /api/products/health
///
/// The cache reads `initializing` until an issuing replica has published a
/// non-empty canonical secret.
pub async fn inventory_health(State(state): State<InventoryState>) -> impl IntoResponse {
    let database = up_down(state.products.ping().await);
    let cache = match state.secrets.get(&state.secret_key).await {
        Ok(Some(value)) if !value.is_empty() => "up",
        Ok(_) => "initializing",
        Err(_) => "down",
    };
    let live = database == "up" && cache == "up";

    respond(
        live,
        json!({
            "status": if live { "live" } else { "unhealthy" },
            "timestamp": chrono::Utc::now(),
            "database": database,
            "cache": cache,
        }),
    )
}
