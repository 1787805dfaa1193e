use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::token::{extract_bearer, Claims, TokenVerifier};

/// Authenticated principal extracted from a verified session token
#[derive(Clone, Debug)]
pub struct Principal {
    pub username: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.sub,
            issued_at: DateTime::from_timestamp(claims.iat, 0),
            expires_at: DateTime::from_timestamp(claims.exp, 0),
        }
    }
}

/// Token gate: verifies the bearer token against the live canonical secret
/// and injects the [`Principal`] into the request.
pub async fn require_token(
    State(verifier): State<TokenVerifier>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = verifier.verify(extract_bearer(&headers)).await?;

    request.extensions_mut().insert(Principal::from(claims));

    Ok(next.run(request).await)
}
