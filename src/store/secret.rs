use async_trait::async_trait;

use super::StoreError;

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Created,
    AlreadyExists,
}

/// Key-value cache shared by every replica of both services.
///
/// `set_if_absent` and `replace_if_equals` must be atomic in the backing
/// store; they are the only coordination points between racing replicas.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Establishes the connection if needed and checks the store answers.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<SetOutcome, StoreError>;

    /// Writes `value` only if the key currently holds exactly `expected`.
    /// An absent key never matches.
    async fn replace_if_equals(&self, key: &str, expected: &str, value: &str) -> Result<SetOutcome, StoreError>;
}
