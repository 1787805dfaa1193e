//! The canonical signing secret and each replica's view of it.
//!
//! Every replica of both services must sign and verify with one value. The
//! first issuing replica to find the cache key empty creates it with an atomic
//! set-if-absent; everyone else adopts whatever the cache holds.

pub mod resync;

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::store::{SecretStore, SetOutcome, StoreError};

pub use resync::resync_loop;

/// Raw entropy in a freshly generated secret (256 bits)
pub const SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cache still holds an empty value under '{0}'")]
    Empty(String),

    #[error("secret under '{0}' disappeared between write and read")]
    Vanished(String),
}

/// The shared signing key, hex encoded as stored in the cache.
#[derive(Clone, PartialEq, Eq)]
pub struct CanonicalSecret(String);

impl CanonicalSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn from_stored(value: String) -> Option<Self> {
        if value.is_empty() {
            return None;
        }
        Some(Self(value))
    }

    /// HMAC key material
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Value to write to the cache
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short, non-reversible identifier safe to log
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..6])
    }
}

impl std::fmt::Debug for CanonicalSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CanonicalSecret(sha256:{})", self.fingerprint())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretState {
    /// Bootstrap has not completed; issuance must be refused
    Pending,
    Ready(CanonicalSecret),
}

/// In-process copy of the canonical secret held by an issuing replica.
///
/// Starts `Pending`. Only the owning process writes it: bootstrap once, then
/// the resync task if the cache value is rotated out of band.
#[derive(Clone)]
pub struct ReplicaSecret {
    tx: Arc<watch::Sender<SecretState>>,
}

impl ReplicaSecret {
    pub fn pending() -> Self {
        let (tx, _rx) = watch::channel(SecretState::Pending);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<CanonicalSecret> {
        match &*self.tx.borrow() {
            SecretState::Ready(secret) => Some(secret.clone()),
            SecretState::Pending => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.tx.borrow(), SecretState::Ready(_))
    }

    /// Stores `secret`, returning true if it differs from what was held.
    pub fn adopt(&self, secret: CanonicalSecret) -> bool {
        self.tx.send_if_modified(|state| match state {
            SecretState::Ready(held) if *held == secret => false,
            _ => {
                *state = SecretState::Ready(secret);
                true
            }
        })
    }

    /// Resolves once a secret has been adopted.
    pub async fn ready(&self) -> CanonicalSecret {
        let mut rx = self.tx.subscribe();
        loop {
            if let SecretState::Ready(secret) = &*rx.borrow_and_update() {
                return secret.clone();
            }
            if rx.changed().await.is_err() {
                // Sender lives as long as self, so this is unreachable in practice
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Writes `candidate` into a slot observed as absent (`None`) or empty.
///
/// Both paths are conditional writes, so at most one racing replica succeeds.
pub(crate) async fn claim_empty_slot(
    store: &dyn SecretStore,
    key: &str,
    observed: Option<&str>,
    candidate: &CanonicalSecret,
) -> Result<SetOutcome, StoreError> {
    match observed {
        Some(stale) => store.replace_if_equals(key, stale, candidate.expose()).await,
        None => store.set_if_absent(key, candidate.expose()).await,
    }
}

/// Reads the canonical secret, creating it if no replica has yet.
///
/// An empty value counts as no secret. Creation is a conditional write, so
/// replicas racing on an empty cache all converge on the single value that
/// won it.
pub async fn establish_canonical_secret(
    store: &dyn SecretStore,
    key: &str,
) -> Result<CanonicalSecret, SecretError> {
    let stored = store.get(key).await?;
    if let Some(secret) = stored.clone().and_then(CanonicalSecret::from_stored) {
        info!(fingerprint = %secret.fingerprint(), "Existing signing secret loaded from cache");
        return Ok(secret);
    }
    if stored.is_some() {
        warn!(%key, "Cache holds an empty signing secret, replacing it");
    }

    let candidate = CanonicalSecret::generate();
    match claim_empty_slot(store, key, stored.as_deref(), &candidate).await? {
        SetOutcome::Created => {
            info!(fingerprint = %candidate.fingerprint(), "New signing secret generated and saved to cache");
            Ok(candidate)
        }
        SetOutcome::AlreadyExists => {
            let winner = store
                .get(key)
                .await?
                .ok_or_else(|| SecretError::Vanished(key.to_string()))?;
            let secret = CanonicalSecret::from_stored(winner).ok_or_else(|| SecretError::Empty(key.to_string()))?;
            warn!(
                fingerprint = %secret.fingerprint(),
                "Lost first-boot race for signing secret, adopting the stored value"
            );
            Ok(secret)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySecretStore;
    use futures::future::join_all;

    const KEY: &str = "system_jwt_secret";

    #[test]
    fn generated_secret_has_full_entropy_width() {
        let secret = CanonicalSecret::generate();
        assert_eq!(secret.expose().len(), SECRET_BYTES * 2);
        assert_ne!(secret, CanonicalSecret::generate());
        assert!(!format!("{:?}", secret).contains(secret.expose()));
    }

    #[tokio::test]
    async fn first_replica_creates_and_second_adopts() {
        let store = MemorySecretStore::new();
        let first = establish_canonical_secret(&store, KEY).await.unwrap();
        let second = establish_canonical_secret(&store, KEY).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some(first.expose()));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn empty_cache_value_is_replaced() {
        let store = MemorySecretStore::new();
        store.set(KEY, "").await.unwrap();

        let secret = establish_canonical_secret(&store, KEY).await.unwrap();
        assert_eq!(store.peek(KEY).await.as_deref(), Some(secret.expose()));
        assert_eq!(establish_canonical_secret(&store, KEY).await.unwrap(), secret);
    }

    #[tokio::test]
    async fn concurrent_replicas_replacing_empty_value_converge() {
        let store = MemorySecretStore::new();
        store.set(KEY, "").await.unwrap();
        let replicas = (0..8).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { establish_canonical_secret(&store, KEY).await.unwrap() })
        });
        let adopted: Vec<CanonicalSecret> = join_all(replicas)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let stored = store.peek(KEY).await.unwrap();
        assert!(adopted.iter().all(|s| s.expose() == stored));
        // The empty placeholder plus exactly one replacement
        assert_eq!(store.write_count(), 2);
    }

    /// The old sequence: GET, then an unconditional SET when absent.
    async fn check_then_act(store: &MemorySecretStore) -> CanonicalSecret {
        if let Some(existing) = store.get(KEY).await.unwrap() {
            return CanonicalSecret::from_stored(existing).unwrap();
        }
        let fresh = CanonicalSecret::generate();
        store.set(KEY, fresh.expose()).await.unwrap();
        fresh
    }

    #[tokio::test]
    async fn check_then_act_lets_concurrent_first_boots_diverge() {
        // Both replicas read the empty key before either writes
        let store = MemorySecretStore::with_read_barrier(2);
        let (a, b) = tokio::join!(check_then_act(&store), check_then_act(&store));

        assert_ne!(a, b);
        assert_eq!(store.write_count(), 2);
        let stored = store.peek(KEY).await.unwrap();
        // Exactly one replica holds a copy that no longer matches the cache
        assert!(stored == a.expose() || stored == b.expose());
        assert!(a.expose() != stored || b.expose() != stored);
    }

    #[tokio::test]
    async fn set_if_absent_converges_concurrent_first_boots() {
        let store = MemorySecretStore::new();
        let replicas = (0..16).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { establish_canonical_secret(&store, KEY).await.unwrap() })
        });
        let adopted: Vec<CanonicalSecret> = join_all(replicas)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let stored = store.get(KEY).await.unwrap().unwrap();
        assert!(adopted.iter().all(|s| s.expose() == stored));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn replica_secret_starts_pending() {
        let handle = ReplicaSecret::pending();
        assert!(handle.current().is_none());

        let secret = CanonicalSecret::generate();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.ready().await })
        };
        assert!(handle.adopt(secret.clone()));
        assert!(!handle.adopt(secret.clone()));
        assert_eq!(waiter.await.unwrap(), secret);
        assert!(handle.is_ready());
    }
}
