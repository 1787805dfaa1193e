use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use super::{verify_at, Claims, TokenError};
use crate::secret::CanonicalSecret;
use crate::store::{SecretStore, StoreError};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("no credential supplied")]
    MissingCredential,

    /// Cache has no canonical secret yet; retriable
    #[error("security subsystem initializing")]
    SecretNotReady,

    #[error("invalid or expired credential: {0}")]
    Invalid(String),

    #[error("verification subsystem error: {0}")]
    Store(StoreError),
}

impl From<TokenError> for VerifyError {
    fn from(err: TokenError) -> Self {
        VerifyError::Invalid(err.to_string())
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Validates bearer tokens against the canonical secret held in the cache.
///
/// With no cache TTL the secret is read on every call, so a rotation is seen
/// by the very next request. With a TTL the cached copy is still refreshed
/// once whenever it fails to verify a token, which bounds staleness to one
/// request per rotation.
#[derive(Clone)]
pub struct TokenVerifier {
    store: Arc<dyn SecretStore>,
    key: String,
    cache_ttl: Option<Duration>,
    cached: Arc<RwLock<Option<(CanonicalSecret, Instant)>>>,
}

impl TokenVerifier {
    pub fn new(store: Arc<dyn SecretStore>, key: impl Into<String>, cache_ttl: Option<Duration>) -> Self {
        Self {
            store,
            key: key.into(),
            cache_ttl,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn verify(&self, token: Option<&str>) -> Result<Claims, VerifyError> {
        self.verify_at(token, Utc::now().timestamp()).await
    }

    pub async fn verify_at(&self, token: Option<&str>, now: i64) -> Result<Claims, VerifyError> {
        let token = token.ok_or(VerifyError::MissingCredential)?;

        if let Some(secret) = self.cached_secret().await {
            match verify_at(token, &secret, now) {
                Ok(claims) => return Ok(claims),
                // Possibly rotated; fall through to a fresh read
                Err(TokenError::Rejected(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let secret = self.fetch_secret().await?;
        Ok(verify_at(token, &secret, now)?)
    }

    async fn cached_secret(&self) -> Option<CanonicalSecret> {
        let ttl = self.cache_ttl?;
        let cached = self.cached.read().await;
        match &*cached {
            Some((secret, fetched)) if fetched.elapsed() < ttl => Some(secret.clone()),
            _ => None,
        }
    }

    async fn fetch_secret(&self) -> Result<CanonicalSecret, VerifyError> {
        let stored = self.store.get(&self.key).await.map_err(VerifyError::Store)?;
        let secret = stored
            .and_then(CanonicalSecret::from_stored)
            .ok_or(VerifyError::SecretNotReady)?;
        if self.cache_ttl.is_some() {
            *self.cached.write().await = Some((secret.clone(), Instant::now()));
        }
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySecretStore;
    use crate::token::issue;
    use axum::http::HeaderValue;

    const KEY: &str = "system_jwt_secret";

    fn token_for(secret: &CanonicalSecret) -> (String, Claims) {
        let claims = Claims::new("admin", Utc::now(), chrono::Duration::hours(8));
        (issue(&claims, secret).unwrap(), claims)
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic YWRtaW46YWRtaW4="));
        assert_eq!(extract_bearer(&headers), None);
    }

    #[tokio::test]
    async fn missing_token_is_missing_credential() {
        let verifier = TokenVerifier::new(Arc::new(MemorySecretStore::new()), KEY, None);
        assert!(matches!(verifier.verify(None).await, Err(VerifyError::MissingCredential)));
    }

    #[tokio::test]
    async fn absent_secret_is_not_ready_never_invalid() {
        let verifier = TokenVerifier::new(Arc::new(MemorySecretStore::new()), KEY, None);
        let (token, _) = token_for(&CanonicalSecret::generate());
        assert!(matches!(verifier.verify(Some(&token)).await, Err(VerifyError::SecretNotReady)));
        assert!(matches!(verifier.verify(Some("garbage")).await, Err(VerifyError::SecretNotReady)));
    }

    #[tokio::test]
    async fn empty_secret_is_not_ready() {
        let store = MemorySecretStore::new();
        store.set(KEY, "").await.unwrap();
        let verifier = TokenVerifier::new(Arc::new(store), KEY, None);
        let (token, _) = token_for(&CanonicalSecret::generate());
        assert!(matches!(verifier.verify(Some(&token)).await, Err(VerifyError::SecretNotReady)));
    }

    #[tokio::test]
    async fn wrongly_signed_token_is_invalid() {
        let store = MemorySecretStore::new();
        store.set(KEY, CanonicalSecret::generate().expose()).await.unwrap();
        let verifier = TokenVerifier::new(Arc::new(store), KEY, None);

        let (token, _) = token_for(&CanonicalSecret::generate());
        assert!(matches!(verifier.verify(Some(&token)).await, Err(VerifyError::Invalid(_))));
    }

    #[tokio::test]
    async fn store_failure_is_reported_as_such() {
        let store = MemorySecretStore::new();
        store.set_online(false);
        let verifier = TokenVerifier::new(Arc::new(store), KEY, None);
        assert!(matches!(verifier.verify(Some("abc")).await, Err(VerifyError::Store(_))));
    }

    #[tokio::test]
    async fn uncached_verifier_follows_rotation_immediately() {
        let store = MemorySecretStore::new();
        let old = CanonicalSecret::generate();
        store.set(KEY, old.expose()).await.unwrap();
        let verifier = TokenVerifier::new(Arc::new(store.clone()), KEY, None);

        let (old_token, _) = token_for(&old);
        assert!(verifier.verify(Some(&old_token)).await.is_ok());

        let new = CanonicalSecret::generate();
        store.set(KEY, new.expose()).await.unwrap();
        let (new_token, _) = token_for(&new);
        assert!(verifier.verify(Some(&new_token)).await.is_ok());
        assert!(matches!(verifier.verify(Some(&old_token)).await, Err(VerifyError::Invalid(_))));
    }

    #[tokio::test]
    async fn cached_verifier_refreshes_on_mismatch() {
        let store = MemorySecretStore::new();
        let old = CanonicalSecret::generate();
        store.set(KEY, old.expose()).await.unwrap();
        let verifier = TokenVerifier::new(Arc::new(store.clone()), KEY, Some(Duration::from_secs(300)));

        let (old_token, _) = token_for(&old);
        assert!(verifier.verify(Some(&old_token)).await.is_ok());

        let new = CanonicalSecret::generate();
        store.set(KEY, new.expose()).await.unwrap();
        let (new_token, _) = token_for(&new);
        assert!(verifier.verify(Some(&new_token)).await.is_ok());
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let store = MemorySecretStore::new();
        let secret = CanonicalSecret::generate();
        store.set(KEY, secret.expose()).await.unwrap();
        let verifier = TokenVerifier::new(Arc::new(store), KEY, None);

        let (token, claims) = token_for(&secret);
        assert!(verifier.verify_at(Some(&token), claims.exp - 1).await.is_ok());
        assert!(matches!(
            verifier.verify_at(Some(&token), claims.exp + 1).await,
            Err(VerifyError::Invalid(_))
        ));
    }
}
