//! External collaborators: the shared secret cache and the record store.
//!
//! Both sit behind async traits so the services can run against Redis and
//! Postgres in production and against the in-memory implementations in tests.

pub mod memory;
pub mod records;
pub mod redis;
pub mod secret;

use thiserror::Error;

pub use memory::MemorySecretStore;
pub use records::{MemoryRecordStore, PgRecordStore, ProductStore, RecordStore, UserStore};
pub use self::redis::RedisSecretStore;
pub use secret::{SecretStore, SetOutcome};

/// Errors from either external store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query error: {0}")]
    Query(String),

    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// True for failures that a later attempt may not hit (refused connection, timeout).
    pub fn is_connection(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Redis(e) => e.is_connection_refusal() || e.is_timeout() || e.is_io_error(),
            StoreError::Sqlx(e) => matches!(e, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed),
            StoreError::Query(_) => false,
        }
    }
}
