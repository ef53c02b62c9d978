use crate::error::{Error, SyncResult};
use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// Fallback key used when a beneficiary has no settings of their own
pub const DEFAULT_KEY: &str = "DEFAULT";

/// Redis keys for the settings repository
mod keys {
    pub const SETTINGS_NAMES: &str = "planicare:settings:names";
    pub const SETTINGS_PREFIX: &str = "planicare:settings:entry:";
}

/// Per-beneficiary event settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySettings {
    /// Google Calendar color id, "1" through "11"
    pub color_id: String,
    /// Description template for materialized events
    pub description: String,
    /// Event location
    pub location: String,
}

/// Repository for the canonical-name -> settings table.
///
/// The table is read at parse time and written when new beneficiaries are
/// auto-registered; no process-wide singleton.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Settings for one canonical name, if present
    async fn get(&self, name: &str) -> SyncResult<Option<EntitySettings>>;

    /// Insert or replace settings for a canonical name
    async fn put(&self, name: &str, settings: EntitySettings) -> SyncResult<()>;

    /// The whole table, including the DEFAULT entry if present
    async fn all(&self) -> SyncResult<HashMap<String, EntitySettings>>;
}

/// In-memory implementation (tests, previews)
#[derive(Debug, Default)]
pub struct InMemorySettings {
    entries: RwLock<HashMap<String, EntitySettings>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an existing map
    pub fn from_map(entries: HashMap<String, EntitySettings>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettings {
    async fn get(&self, name: &str) -> SyncResult<Option<EntitySettings>> {
        let entries = self.entries.read().await;
        Ok(entries.get(name).cloned())
    }

    async fn put(&self, name: &str, settings: EntitySettings) -> SyncResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(name.to_string(), settings);
        Ok(())
    }

    async fn all(&self) -> SyncResult<HashMap<String, EntitySettings>> {
        let entries = self.entries.read().await;
        Ok(entries.clone())
    }
}

/// Redis-backed implementation
pub struct RedisSettings {
    client: RedisClient,
}

impl RedisSettings {
    pub fn new(redis_url: &str) -> SyncResult<Self> {
        info!("Connecting settings repository to Redis at {}", redis_url);
        let client = RedisClient::open(redis_url)
            .map_err(|e| Error::Redis(format!("Failed to create Redis client: {}", e)))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> SyncResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Redis(format!("Failed to connect to Redis: {}", e)))
    }
}

#[async_trait]
impl SettingsRepository for RedisSettings {
    async fn get(&self, name: &str) -> SyncResult<Option<EntitySettings>> {
        let key = format!("{}{}", keys::SETTINGS_PREFIX, name);
        let mut conn = self.connection().await?;

        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Ok(None);
        }

        let data: String = conn.get(&key).await?;
        let settings: EntitySettings = serde_json::from_str(&data)?;
        Ok(Some(settings))
    }

    async fn put(&self, name: &str, settings: EntitySettings) -> SyncResult<()> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(&settings)?;

        let key = format!("{}{}", keys::SETTINGS_PREFIX, name);
        conn.set::<_, _, ()>(&key, &json).await?;
        conn.sadd::<_, _, ()>(keys::SETTINGS_NAMES, name).await?;

        info!("Stored settings for {}", name);
        Ok(())
    }

    async fn all(&self) -> SyncResult<HashMap<String, EntitySettings>> {
        let mut conn = self.connection().await?;
        let names: Vec<String> = conn.smembers(keys::SETTINGS_NAMES).await?;

        let mut entries = HashMap::with_capacity(names.len());
        for name in names {
            let key = format!("{}{}", keys::SETTINGS_PREFIX, name);
            let data: Option<String> = conn.get(&key).await?;
            if let Some(data) = data {
                let settings: EntitySettings = serde_json::from_str(&data)?;
                entries.insert(name, settings);
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let repo = InMemorySettings::new();
        let settings = EntitySettings {
            color_id: "5".to_string(),
            description: "Aide à domicile".to_string(),
            location: "Lyon".to_string(),
        };

        repo.put("DUPONT, Jean", settings.clone()).await.unwrap();
        assert_eq!(repo.get("DUPONT, Jean").await.unwrap(), Some(settings));
        assert_eq!(repo.get("ABSENT, Nom").await.unwrap(), None);
        assert_eq!(repo.all().await.unwrap().len(), 1);
    }
}
