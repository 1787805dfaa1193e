// handlers/public/auth/login.rs - POST /auth/login handler

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use serde::Deserialize;

use crate::middleware::{ApiResponse, ApiResult};
use crate::server::auth::AuthState;
use crate::services::IssuedToken;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /auth/login - Authenticate user and receive a session token
///
/// Expected Input:
/// ```json
/// { "username": "admin", "password": "admin" }
/// ```
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiI...",
///     "expires_at": "2026-03-01T17:00:00Z",
///     "expires_in": 28800
///   }
/// }
/// ```
///
/// 401 for a wrong password and for an unknown user alike, 503 while the
/// replica has not adopted the signing secret yet.
pub async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<IssuedToken> {
    let Json(request) = payload?;
    let issued = state.service.login(&request.username, &request.password).await?;
    Ok(ApiResponse::success(issued))
}
