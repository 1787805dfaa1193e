use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Barrier, RwLock};

use super::secret::{SecretStore, SetOutcome};
use super::StoreError;

/// In-process secret store for tests and local development.
///
/// Clones share the same data, so handing one clone to each simulated
/// replica behaves like a single shared cache.
#[derive(Clone, Default)]
pub struct MemorySecretStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    data: RwLock<HashMap<String, String>>,
    offline: AtomicBool,
    writes: AtomicUsize,
    read_barrier: Option<Arc<Barrier>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `get` waits until `parties` reads are in flight before returning.
    ///
    /// Lets a test line up replicas so they all observe the same snapshot.
    pub fn with_read_barrier(parties: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                read_barrier: Some(Arc::new(Barrier::new(parties))),
                ..Inner::default()
            }),
        }
    }

    /// Simulates an outage: while offline every operation fails as a refused connection.
    pub fn set_online(&self, online: bool) {
        self.inner.offline.store(!online, Ordering::SeqCst);
    }

    /// Number of successful writes, conditional or not.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Reads a key directly, ignoring the read barrier and outage flag.
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.inner.data.read().await.get(key).cloned()
    }

    /// Removes a key, as an operator flushing the cache would.
    pub async fn remove(&self, key: &str) {
        self.inner.data.write().await.remove(key);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_online()?;
        let value = self.inner.data.read().await.get(key).cloned();
        if let Some(barrier) = &self.inner.read_barrier {
            barrier.wait().await;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.inner
            .data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<SetOutcome, StoreError> {
        self.check_online()?;
        let mut data = self.inner.data.write().await;
        if data.contains_key(key) {
            return Ok(SetOutcome::AlreadyExists);
        }
        data.insert(key.to_string(), value.to_string());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(SetOutcome::Created)
    }

    async fn replace_if_equals(&self, key: &str, expected: &str, value: &str) -> Result<SetOutcome, StoreError> {
        self.check_online()?;
        let mut data = self.inner.data.write().await;
        match data.get_mut(key) {
            Some(current) if current == expected => {
                *current = value.to_string();
                self.inner.writes.fetch_add(1, Ordering::SeqCst);
                Ok(SetOutcome::Created)
            }
            _ => Ok(SetOutcome::AlreadyExists),
        }
    }
}
