use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{claim_empty_slot, CanonicalSecret, ReplicaSecret};
use crate::store::{SecretStore, SetOutcome, StoreError};

/// Outcome of one resync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    Unchanged,
    /// The cache held a different value and the replica switched to it
    Adopted,
    /// The key was gone or empty and this replica's value was written back
    Republished,
}

/// Brings an issuing replica's copy in line with the cache.
///
/// Keeps issuance consistent with the verifiers, which always read the cache.
pub async fn resync_once(
    store: &dyn SecretStore,
    key: &str,
    handle: &ReplicaSecret,
) -> Result<Resync, StoreError> {
    let Some(held) = handle.current() else {
        return Ok(Resync::Unchanged);
    };

    let stored = store.get(key).await?;
    match stored.clone().and_then(CanonicalSecret::from_stored) {
        Some(current) if current == held => Ok(Resync::Unchanged),
        Some(current) => {
            info!(
                previous = %held.fingerprint(),
                current = %current.fingerprint(),
                "Signing secret rotated in cache, adopting new value"
            );
            handle.adopt(current);
            Ok(Resync::Adopted)
        }
        None => match claim_empty_slot(store, key, stored.as_deref(), &held).await? {
            SetOutcome::Created => {
                warn!(fingerprint = %held.fingerprint(), "Signing secret missing from cache, republished");
                Ok(Resync::Republished)
            }
            SetOutcome::AlreadyExists => {
                // Another replica republished first; pick its value up next pass
                debug!("Signing secret republished by a sibling replica");
                Ok(Resync::Unchanged)
            }
        },
    }
}

/// Runs [`resync_once`] every `interval` until cancelled.
pub async fn resync_loop(
    store: std::sync::Arc<dyn SecretStore>,
    key: String,
    handle: ReplicaSecret,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // First tick fires immediately; bootstrap just read the cache
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Secret resync stopped");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = resync_once(store.as_ref(), &key, &handle).await {
                    warn!(error = %e, "Secret resync failed, keeping current value");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySecretStore;

    const KEY: &str = "system_jwt_secret";

    #[tokio::test]
    async fn adopts_externally_rotated_value() {
        let store = MemorySecretStore::new();
        let handle = ReplicaSecret::pending();
        let original = CanonicalSecret::generate();
        store.set(KEY, original.expose()).await.unwrap();
        handle.adopt(original.clone());

        assert_eq!(resync_once(&store, KEY, &handle).await.unwrap(), Resync::Unchanged);

        let rotated = CanonicalSecret::generate();
        store.set(KEY, rotated.expose()).await.unwrap();
        assert_eq!(resync_once(&store, KEY, &handle).await.unwrap(), Resync::Adopted);
        assert_eq!(handle.current(), Some(rotated));
    }

    #[tokio::test]
    async fn republishes_after_cache_flush() {
        let store = MemorySecretStore::new();
        let handle = ReplicaSecret::pending();
        let held = CanonicalSecret::generate();
        handle.adopt(held.clone());

        assert_eq!(resync_once(&store, KEY, &handle).await.unwrap(), Resync::Republished);
        assert_eq!(store.peek(KEY).await.as_deref(), Some(held.expose()));
    }

    #[tokio::test]
    async fn repairs_emptied_value() {
        let store = MemorySecretStore::new();
        let handle = ReplicaSecret::pending();
        let held = CanonicalSecret::generate();
        handle.adopt(held.clone());
        store.set(KEY, "").await.unwrap();

        assert_eq!(resync_once(&store, KEY, &handle).await.unwrap(), Resync::Republished);
        assert_eq!(store.peek(KEY).await.as_deref(), Some(held.expose()));
        assert_eq!(resync_once(&store, KEY, &handle).await.unwrap(), Resync::Unchanged);
    }

    #[tokio::test]
    async fn pending_replica_does_nothing() {
        let store = MemorySecretStore::new();
        let handle = ReplicaSecret::pending();
        assert_eq!(resync_once(&store, KEY, &handle).await.unwrap(), Resync::Unchanged);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_picks_up_rotation_within_one_interval() {
        let store = MemorySecretStore::new();
        let handle = ReplicaSecret::pending();
        let original = CanonicalSecret::generate();
        store.set(KEY, original.expose()).await.unwrap();
        handle.adopt(original);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(resync_loop(
            std::sync::Arc::new(store.clone()),
            KEY.to_string(),
            handle.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        ));

        let rotated = CanonicalSecret::generate();
        store.set(KEY, rotated.expose()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(handle.current(), Some(rotated));

        cancel.cancel();
        task.await.unwrap();
    }
}
