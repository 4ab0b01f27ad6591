//! The remote side of the lock: an atomic conditional set and an atomic
//! compare-and-delete. Everything else lives in the local arbiter.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `token` with a `ttl` expiry, only if `key` is absent.
    ///
    /// Returns `true` when this call created the key.
    async fn conditional_set(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete `key` only if its current value is `token`, atomically.
    ///
    /// Returns whether a deletion happened.
    async fn compare_delete(&self, key: &str, token: &str) -> Result<bool, StoreError>;
}
