use crate::error::{env_error, SyncResult};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;

/// Default timezone for produced calendar events
pub const DEFAULT_TIMEZONE: &str = "Europe/Paris";

/// Default number of events created per batch during sync
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default pause between create batches, in milliseconds
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1_000;

/// Default retry cap for rate-limited event creation
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default minimum buffer between same-day appointments, in minutes
pub const DEFAULT_GAP_THRESHOLD_MINUTES: i64 = 30;

/// Main configuration structure for the sync service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Google Calendar API client ID
    pub google_client_id: String,
    /// Google Calendar API client secret
    pub google_client_secret: String,
    /// Google Calendar ID to sync appointments into
    pub google_calendar_id: String,
    /// Redis connection URL (lock, settings, token cache, backup index)
    pub redis_url: String,
    /// Root directory for backup files
    pub backup_dir: String,
    /// Timezone applied to event start/end times
    pub timezone: String,
    /// Events created per batch
    pub batch_size: usize,
    /// Pause between create batches, milliseconds
    pub batch_delay_ms: u64,
    /// Retry cap for rate-limited creates
    pub max_retries: u32,
    /// Minimum buffer between same-day appointments, minutes
    pub gap_threshold_minutes: i64,
    /// Name correction table, wrong form -> correct form
    pub name_corrections: HashMap<String, String>,
}

impl Config {
    /// Load configuration from environment and the correction-table file
    pub fn load() -> SyncResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        // Required environment variables
        let google_client_id =
            env::var("GOOGLE_CLIENT_ID").map_err(|_| env_error("GOOGLE_CLIENT_ID"))?;
        let google_client_secret =
            env::var("GOOGLE_CLIENT_SECRET").map_err(|_| env_error("GOOGLE_CLIENT_SECRET"))?;
        let google_calendar_id =
            env::var("GOOGLE_CALENDAR_ID").map_err(|_| env_error("GOOGLE_CALENDAR_ID"))?;

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let backup_dir = env::var("BACKUP_DIR").unwrap_or_else(|_| "backups".to_string());
        let timezone = env::var("TIMEZONE").unwrap_or_else(|_| String::from(DEFAULT_TIMEZONE));

        let batch_size = env::var("SYNC_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let batch_delay_ms = env::var("SYNC_BATCH_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_BATCH_DELAY_MS);

        let max_retries = env::var("SYNC_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let gap_threshold_minutes = env::var("GAP_THRESHOLD_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_GAP_THRESHOLD_MINUTES);

        let name_corrections = Self::load_corrections("config/name_corrections.toml");

        Ok(Config {
            google_client_id,
            google_client_secret,
            google_calendar_id,
            redis_url,
            backup_dir,
            timezone,
            batch_size,
            batch_delay_ms,
            max_retries,
            gap_threshold_minutes,
            name_corrections,
        })
    }

    /// Load the name-correction table from file if it exists
    pub fn load_corrections(path: &str) -> HashMap<String, String> {
        let mut corrections = HashMap::new();

        if let Ok(content) = fs::read_to_string(path) {
            if let Ok(file_corrections) = toml::from_str::<HashMap<String, String>>(&content) {
                for (key, value) in file_corrections {
                    corrections.insert(key, value);
                }
            }
        }

        corrections
    }
}
