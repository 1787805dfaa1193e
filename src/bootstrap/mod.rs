//! Startup sequences run before a replica can do useful work.
//!
//! The issuing service connects to both stores, seeds the default principal
//! and establishes the canonical secret. The consuming service only needs its
//! stores reachable. Either sequence is retried as a whole by
//! [`RetrySupervisor`] until it succeeds.

pub mod supervisor;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::password::{PasswordError, Passwords};
use crate::secret::{establish_canonical_secret, CanonicalSecret, SecretError};
use crate::store::{RecordStore, SecretStore, StoreError, UserStore};

pub use supervisor::{RetryPolicy, RetrySupervisor};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("shared cache: {0}")]
    Cache(StoreError),

    #[error("record store: {0}")]
    Records(StoreError),

    #[error("seeding default user: {0}")]
    Seed(#[from] PasswordError),

    #[error("signing secret: {0}")]
    Secret(#[from] SecretError),
}

/// Principal created on first boot if absent
#[derive(Debug, Clone)]
pub struct SeedUser {
    pub username: String,
    pub password: String,
}

/// Startup sequence of an issuing replica
#[derive(Clone)]
pub struct IssuerBootstrap {
    pub secrets: Arc<dyn SecretStore>,
    pub users: Arc<dyn UserStore>,
    pub passwords: Passwords,
    pub seed: SeedUser,
    pub secret_key: String,
}

impl IssuerBootstrap {
    /// One full attempt. Every step is safe to repeat.
    pub async fn attempt(&self) -> Result<CanonicalSecret, BootstrapError> {
        self.secrets.ping().await.map_err(BootstrapError::Cache)?;
        info!("Connected to shared cache");

        self.users.prepare().await.map_err(BootstrapError::Records)?;
        info!("Connected to record store");

        self.seed_default_user().await?;

        let secret = establish_canonical_secret(self.secrets.as_ref(), &self.secret_key).await?;
        Ok(secret)
    }

    async fn seed_default_user(&self) -> Result<(), BootstrapError> {
        let existing = self
            .users
            .find_by_username(&self.seed.username)
            .await
            .map_err(BootstrapError::Records)?;
        if existing.is_some() {
            return Ok(());
        }

        let hash = self.passwords.hash(&self.seed.password).await?;
        let created = self
            .users
            .create_user(&self.seed.username, &hash)
            .await
            .map_err(BootstrapError::Records)?;
        if created {
            info!(username = %self.seed.username, "Default user seeded");
        }
        Ok(())
    }
}

/// Startup sequence of a consuming replica: both stores reachable
#[derive(Clone)]
pub struct DependencyBootstrap {
    pub secrets: Arc<dyn SecretStore>,
    pub records: Arc<dyn RecordStore>,
}

impl DependencyBootstrap {
    pub async fn attempt(&self) -> Result<(), BootstrapError> {
        self.secrets.ping().await.map_err(BootstrapError::Cache)?;
        info!("Connected to shared cache");

        self.records.prepare().await.map_err(BootstrapError::Records)?;
        info!("Connected to record store");
        Ok(())
    }
}
