use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::info;

// Compare-and-set; an absent key reads as false and never matches
const REPLACE_IF_EQUALS: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

use super::secret::{SecretStore, SetOutcome};
use super::StoreError;

/// Redis-backed secret store.
///
/// The connection is opened lazily on first use so a replica can start while
/// the cache is still down; `ConnectionManager` reconnects on its own after that.
pub struct RedisSecretStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisSecretStore {
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let manager = self.client.get_connection_manager().await?;
                info!("Connected to shared cache");
                Ok::<_, StoreError>(manager)
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl SecretStore for RedisSecretStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET").arg(key).arg(value).query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<SetOutcome, StoreError> {
        let mut conn = self.connection().await?;
        // SET NX replies OK when written and nil when the key already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(match reply {
            Some(_) => SetOutcome::Created,
            None => SetOutcome::AlreadyExists,
        })
    }

    async fn replace_if_equals(&self, key: &str, expected: &str, value: &str) -> Result<SetOutcome, StoreError> {
        let mut conn = self.connection().await?;
        let replaced: i64 = redis::Script::new(REPLACE_IF_EQUALS)
            .key(key)
            .arg(expected)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        Ok(if replaced == 1 {
            SetOutcome::Created
        } else {
            SetOutcome::AlreadyExists
        })
    }
}
