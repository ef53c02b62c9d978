use crate::error::{Error, SyncResult};
use async_trait::async_trait;
use redis::Client as RedisClient;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Lock time-to-live so a crashed job cannot hold a window forever
const LOCK_TTL_SECONDS: u64 = 15 * 60;

/// Build the lock key for one sync window
pub fn lock_key(calendar_id: &str, month: u32, year: i32) -> String {
    format!("planicare:sync_lock:{}:{}:{}", calendar_id, year, month)
}

/// Distributed single-in-flight lock per sync window. Acquisition is
/// non-blocking: a held lock means the caller skips, it never queues.
#[async_trait]
pub trait SyncLock: Send + Sync {
    /// Try to take the lock; false when it is already held
    async fn try_acquire(&self, key: &str) -> SyncResult<bool>;

    /// Release a previously acquired lock
    async fn release(&self, key: &str) -> SyncResult<()>;
}

/// Redis SET NX EX implementation
pub struct RedisSyncLock {
    client: RedisClient,
    /// Per-instance token so a release cannot drop someone else's lock
    token: String,
}

impl RedisSyncLock {
    pub fn new(redis_url: &str) -> SyncResult<Self> {
        let client = RedisClient::open(redis_url)
            .map_err(|e| Error::Lock(format!("Failed to create Redis client: {}", e)))?;
        Ok(Self {
            client,
            token: Uuid::new_v4().to_string(),
        })
    }

    async fn connection(&self) -> SyncResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Lock(format!("Failed to connect to Redis: {}", e)))
    }
}

#[async_trait]
impl SyncLock for RedisSyncLock {
    async fn try_acquire(&self, key: &str) -> SyncResult<bool> {
        let mut conn = self.connection().await?;
        let outcome: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&self.token)
            .arg("NX")
            .arg("EX")
            .arg(LOCK_TTL_SECONDS)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Lock(format!("Redis SET error: {}", e)))?;

        let acquired = outcome.is_some();
        debug!("Lock {} acquire: {}", key, acquired);
        Ok(acquired)
    }

    async fn release(&self, key: &str) -> SyncResult<()> {
        let mut conn = self.connection().await?;

        let holder: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Lock(format!("Redis GET error: {}", e)))?;

        if holder.as_deref() == Some(self.token.as_str()) {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut conn)
                .await
                .map_err(|e| Error::Lock(format!("Redis DEL error: {}", e)))?;
            debug!("Lock {} released", key);
        }

        Ok(())
    }
}

/// In-memory implementation for tests and single-process runs
#[derive(Debug, Default)]
pub struct InMemorySyncLock {
    held: Mutex<HashMap<String, ()>>,
}

impl InMemorySyncLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncLock for InMemorySyncLock {
    async fn try_acquire(&self, key: &str) -> SyncResult<bool> {
        let mut held = self.held.lock().await;
        if held.contains_key(key) {
            return Ok(false);
        }
        held.insert(key.to_string(), ());
        Ok(true)
    }

    async fn release(&self, key: &str) -> SyncResult<()> {
        let mut held = self.held.lock().await;
        held.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_lock_is_exclusive() {
        let lock = InMemorySyncLock::new();
        let key = lock_key("cal", 3, 2025);

        assert!(lock.try_acquire(&key).await.unwrap());
        assert!(!lock.try_acquire(&key).await.unwrap());

        lock.release(&key).await.unwrap();
        assert!(lock.try_acquire(&key).await.unwrap());
    }

    #[test]
    fn lock_keys_scope_by_window() {
        assert_ne!(lock_key("cal", 3, 2025), lock_key("cal", 4, 2025));
        assert_ne!(lock_key("cal", 3, 2025), lock_key("other", 3, 2025));
    }
}
