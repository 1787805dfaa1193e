// handlers/public/auth/password.rs - POST /auth/change-password handler

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::auth::AuthState;

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub username: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// POST /auth/change-password - Replace a user's password
///
/// Expected Input:
/// ```json
/// { "username": "admin", "newPassword": "s3cret" }
/// ```
///
/// 404 when no such user exists.
pub async fn change_password(
    State(state): State<AuthState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    if request.new_password.is_empty() {
        return Err(ApiError::bad_request("newPassword must not be empty"));
    }

    state
        .service
        .change_password(&request.username, &request.new_password)
        .await?;

    Ok(ApiResponse::success(json!({ "message": "Password updated" })))
}
