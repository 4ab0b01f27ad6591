use super::LockStore;
use crate::error::StoreError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::time::Duration;
use tracing::debug;

const COMPARE_DELETE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed store: `SET NX PX` to take the key, a Lua script to
/// delete it only when the token still matches.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    compare_delete: Script,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. "redis://localhost:6379").
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        debug!("Connecting lock store to {}", url);
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            compare_delete: Script::new(COMPARE_DELETE_SCRIPT),
        }
    }
}

#[async_trait]
impl LockStore for RedisStore {
    async fn conditional_set(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn compare_delete(&self, key: &str, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .compare_delete
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }
}
