use crate::calendar::models::CalendarEvent;
use crate::error::{backup_error, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Metadata stored alongside the backed-up events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMeta {
    pub user_id: String,
    pub calendar_id: String,
    pub calendar_name: String,
    pub month: u32,
    pub year: i32,
    pub backup_date: DateTime<Utc>,
    pub event_count: usize,
}

/// On-disk backup file content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    pub backup_metadata: BackupMeta,
    pub events: Vec<CalendarEvent>,
}

/// Queryable record for one written backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub user_id: String,
    pub calendar_id: String,
    pub month: u32,
    pub year: i32,
    pub event_count: usize,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// Index of written backups, separate from the file blobs
#[async_trait]
pub trait BackupIndex: Send + Sync {
    async fn record(&self, record: &BackupRecord) -> SyncResult<()>;
    async fn list_for(&self, user_id: &str) -> SyncResult<Vec<BackupRecord>>;
}

/// In-memory index for tests
#[derive(Debug, Default)]
pub struct InMemoryBackupIndex {
    records: Mutex<Vec<BackupRecord>>,
}

impl InMemoryBackupIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackupIndex for InMemoryBackupIndex {
    async fn record(&self, record: &BackupRecord) -> SyncResult<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn list_for(&self, user_id: &str) -> SyncResult<Vec<BackupRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Redis-backed index, one list per user
pub struct RedisBackupIndex {
    client: RedisClient,
}

impl RedisBackupIndex {
    pub fn new(redis_url: &str) -> SyncResult<Self> {
        let client = RedisClient::open(redis_url)
            .map_err(|e| backup_error(&format!("Failed to create Redis client: {}", e)))?;
        Ok(Self { client })
    }

    fn key(user_id: &str) -> String {
        format!("planicare:backups:{}", user_id)
    }
}

#[async_trait]
impl BackupIndex for RedisBackupIndex {
    async fn record(&self, record: &BackupRecord) -> SyncResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| backup_error(&format!("Failed to connect to Redis: {}", e)))?;
        let json = serde_json::to_string(record)?;
        conn.rpush::<_, _, ()>(Self::key(&record.user_id), json)
            .await
            .map_err(|e| backup_error(&format!("Redis RPUSH error: {}", e)))?;
        Ok(())
    }

    async fn list_for(&self, user_id: &str) -> SyncResult<Vec<BackupRecord>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| backup_error(&format!("Failed to connect to Redis: {}", e)))?;
        let raw: Vec<String> = conn
            .lrange(Self::key(user_id), 0, -1)
            .await
            .map_err(|e| backup_error(&format!("Redis LRANGE error: {}", e)))?;

        let mut records = Vec::with_capacity(raw.len());
        for item in raw {
            records.push(serde_json::from_str(&item)?);
        }
        Ok(records)
    }
}

/// Write-once file store for pre-sync event snapshots. Backups can be read
/// and deleted but never updated.
pub struct BackupStore<I: BackupIndex> {
    root: PathBuf,
    index: I,
}

impl<I: BackupIndex> BackupStore<I> {
    pub fn new(root: impl Into<PathBuf>, index: I) -> Self {
        Self {
            root: root.into(),
            index,
        }
    }

    /// Persist the events as an immutable JSON blob plus an index record;
    /// returns the file path.
    pub async fn write(
        &self,
        meta: BackupMeta,
        events: Vec<CalendarEvent>,
    ) -> SyncResult<PathBuf> {
        let dir = self
            .root
            .join(&meta.user_id)
            .join(meta.year.to_string())
            .join(format!("{:02}", meta.month));
        fs::create_dir_all(&dir).await?;

        let timestamp = meta.backup_date.format("%Y%m%d%H%M%S");
        let path = dir.join(format!("backup_{}.json", timestamp));

        let document = BackupDocument {
            backup_metadata: meta.clone(),
            events,
        };
        let json = serde_json::to_string_pretty(&document)?;
        fs::write(&path, json).await?;

        self.index
            .record(&BackupRecord {
                id: Uuid::new_v4().to_string(),
                user_id: meta.user_id,
                calendar_id: meta.calendar_id,
                month: meta.month,
                year: meta.year,
                event_count: meta.event_count,
                path: path.to_string_lossy().into_owned(),
                created_at: meta.backup_date,
            })
            .await?;

        info!("Wrote backup {}", path.display());
        Ok(path)
    }

    /// Read a backup file back, events included
    pub async fn read(&self, path: &Path) -> SyncResult<BackupDocument> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Delete a backup file; false when it did not exist
    pub async fn delete(&self, path: &Path) -> SyncResult<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }
}
