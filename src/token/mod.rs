//! Session tokens: HS256 JWTs over the canonical secret.

pub mod verifier;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::secret::CanonicalSecret;

pub use verifier::{extract_bearer, TokenVerifier, VerifyError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Principal (username)
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(principal: impl Into<String>, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: principal.into(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT generation error: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("malformed or wrongly signed token: {0}")]
    Rejected(jsonwebtoken::errors::Error),

    #[error("token expired at {0}")]
    Expired(i64),
}

/// Signs `claims` with the canonical secret.
pub fn issue(claims: &Claims, secret: &CanonicalSecret) -> Result<String, TokenError> {
    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key).map_err(TokenError::Signing)
}

/// Checks signature and expiry as of `now` (unix seconds).
///
/// A token is valid through its `exp` second and rejected after it; no leeway.
pub fn verify_at(token: &str, secret: &CanonicalSecret, now: i64) -> Result<Claims, TokenError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked below against the caller's clock
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let claims = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(TokenError::Rejected)?
        .claims;

    if now > claims.exp {
        return Err(TokenError::Expired(claims.exp));
    }
    Ok(claims)
}

pub fn verify(token: &str, secret: &CanonicalSecret) -> Result<Claims, TokenError> {
    verify_at(token, secret, Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn token_valid_until_expiry_second() {
        let secret = CanonicalSecret::generate();
        let claims = Claims::new("admin", issued_at(), Duration::hours(8));
        let token = issue(&claims, &secret).unwrap();
        let expiry = claims.exp;

        assert_eq!(verify_at(&token, &secret, expiry - 1).unwrap(), claims);
        assert!(matches!(
            verify_at(&token, &secret, expiry + 1),
            Err(TokenError::Expired(e)) if e == expiry
        ));
    }

    #[test]
    fn eight_hour_window() {
        let claims = Claims::new("admin", issued_at(), Duration::hours(8));
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims::new("admin", issued_at(), Duration::hours(8));
        let token = issue(&claims, &CanonicalSecret::generate()).unwrap();
        assert!(matches!(
            verify_at(&token, &CanonicalSecret::generate(), claims.iat),
            Err(TokenError::Rejected(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let secret = CanonicalSecret::generate();
        assert!(matches!(verify_at("not.a.jwt", &secret, 0), Err(TokenError::Rejected(_))));
    }
}
