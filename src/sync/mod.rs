pub mod backup;
pub mod lock;
pub mod progress;

use crate::calendar::client::CalendarApi;
use crate::calendar::models::EventPayload;
use crate::error::{Error, SyncResult};
use backup::{BackupIndex, BackupMeta, BackupStore};
use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use lock::{lock_key, SyncLock};
use progress::ProgressReporter;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

lazy_static! {
    /// Keep marker protecting an event from the delete pass. All four
    /// bracket styles are equivalent: «keep», <keep>, {keep}, (keep).
    static ref KEEP_MARKER_RE: Regex =
        Regex::new(r"(?i)[«<{(]\s*keep\s*[»>})]").expect("keep marker regex");
}

/// One sync job covers one calendar month window
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub user_id: String,
    pub calendar_id: String,
    pub calendar_name: String,
    pub month: u32,
    pub year: i32,
}

/// Terminal state of a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Done,
    /// Lock was already held; nothing was touched
    Skipped,
    Failed,
}

/// A single event that could not be deleted or created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub summary: String,
    pub error: String,
}

/// Final result of a sync job. Partial failures are carried here; they never
/// abort the whole job.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub state: SyncState,
    pub deleted: usize,
    /// Events spared by a keep marker
    pub kept: usize,
    pub created: usize,
    /// Create attempts skipped because the provider already had the event
    pub skipped_duplicates: usize,
    pub failed: Vec<ItemFailure>,
    pub backup_path: Option<PathBuf>,
}

impl SyncReport {
    fn empty(state: SyncState) -> Self {
        Self {
            state,
            deleted: 0,
            kept: 0,
            created: 0,
            skipped_duplicates: 0,
            failed: Vec::new(),
            backup_path: None,
        }
    }
}

/// True when the event description carries a keep marker
pub fn has_keep_marker(description: &str) -> bool {
    KEEP_MARKER_RE.is_match(description)
}

/// Drives one sync job through backup, delete-in-window and batch-create,
/// serialized per window by the distributed lock.
pub struct SyncOrchestrator<I: BackupIndex> {
    api: Arc<dyn CalendarApi>,
    lock: Arc<dyn SyncLock>,
    backups: BackupStore<I>,
    timezone: String,
    batch_size: usize,
    batch_delay: Duration,
    max_retries: u32,
    base_backoff: Duration,
}

impl<I: BackupIndex> SyncOrchestrator<I> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn CalendarApi>,
        lock: Arc<dyn SyncLock>,
        backups: BackupStore<I>,
        timezone: String,
        batch_size: usize,
        batch_delay: Duration,
        max_retries: u32,
        base_backoff: Duration,
    ) -> Self {
        Self {
            api,
            lock,
            backups,
            timezone,
            batch_size: batch_size.max(1),
            batch_delay,
            max_retries: max_retries.max(1),
            base_backoff,
        }
    }

    /// Run a sync job to completion. Returns a SKIPPED report when another
    /// sync already holds this window's lock. The lock is always released,
    /// whatever the outcome.
    pub async fn run(
        &self,
        job: &SyncJob,
        payloads: Vec<EventPayload>,
        reporter: &mut ProgressReporter,
    ) -> SyncResult<SyncReport> {
        let key = lock_key(&job.calendar_id, job.month, job.year);
        if !self.lock.try_acquire(&key).await? {
            info!(
                "Sync for {} {}/{} already in flight, skipping",
                job.calendar_id, job.month, job.year
            );
            return Ok(SyncReport::empty(SyncState::Skipped));
        }

        let outcome = self.execute(job, payloads, reporter).await;

        if let Err(e) = self.lock.release(&key).await {
            warn!("Failed to release sync lock {}: {}", key, e);
        }

        match outcome {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Sync job for {} {}/{} failed: {}", job.calendar_id, job.month, job.year, e);
                let mut report = SyncReport::empty(SyncState::Failed);
                report.failed.push(ItemFailure {
                    summary: "sync job".to_string(),
                    error: e.to_string(),
                });
                Ok(report)
            }
        }
    }

    async fn execute(
        &self,
        job: &SyncJob,
        payloads: Vec<EventPayload>,
        reporter: &mut ProgressReporter,
    ) -> SyncResult<SyncReport> {
        let (time_min, time_max) = month_window(job.month, job.year, &self.timezone)?;
        let existing = self
            .api
            .list(&job.calendar_id, &time_min, &time_max)
            .await?;
        info!(
            "Sync {} {}/{}: {} existing events, {} to create",
            job.calendar_id,
            job.month,
            job.year,
            existing.len(),
            payloads.len()
        );

        let mut report = SyncReport::empty(SyncState::Done);

        // Backup before anything is destroyed. A write failure is logged
        // and the job proceeds; the report shows the missing path.
        if !existing.is_empty() {
            let meta = BackupMeta {
                user_id: job.user_id.clone(),
                calendar_id: job.calendar_id.clone(),
                calendar_name: job.calendar_name.clone(),
                month: job.month,
                year: job.year,
                backup_date: Utc::now(),
                event_count: existing.len(),
            };
            match self.backups.write(meta, existing.clone()).await {
                Ok(path) => report.backup_path = Some(path),
                Err(e) => warn!("Backup write failed, proceeding without one: {}", e),
            }
        }

        // Delete phase, first half of the progress range
        let delete_total = existing.len();
        for (i, event) in existing.iter().enumerate() {
            let description = event.description.as_deref().unwrap_or("");
            if has_keep_marker(description) {
                report.kept += 1;
            } else {
                match self.api.delete(&job.calendar_id, &event.id).await {
                    Ok(()) => report.deleted += 1,
                    // Gone already means someone beat us to it
                    Err(Error::AlreadyDeleted(_)) => report.deleted += 1,
                    Err(e) => report.failed.push(ItemFailure {
                        summary: event.summary.clone().unwrap_or_else(|| event.id.clone()),
                        error: e.to_string(),
                    }),
                }
            }
            reporter.report(i + 1, delete_total, 0, 50, "Deleting existing events");
        }
        if delete_total == 0 {
            reporter.report(0, 0, 0, 50, "No existing events to delete");
        }

        // Create phase, second half. Batches are paced to respect provider
        // rate limits; a rate-limited event retries with capped backoff.
        let create_total = payloads.len();
        let mut done = 0usize;
        let batches: Vec<&[EventPayload]> = payloads.chunks(self.batch_size).collect();
        let batch_count = batches.len();
        for (batch_index, batch) in batches.into_iter().enumerate() {
            for payload in batch {
                match self.insert_with_retry(&job.calendar_id, payload).await {
                    Ok(()) => report.created += 1,
                    // The event already exists; not a failure, not an insert
                    Err(Error::DuplicateEvent(_)) => report.skipped_duplicates += 1,
                    Err(e) => report.failed.push(ItemFailure {
                        summary: payload.summary.clone(),
                        error: e.to_string(),
                    }),
                }
                done += 1;
                reporter.report(done, create_total, 50, 100, "Creating events");
            }
            if batch_index + 1 < batch_count {
                tokio::time::sleep(self.batch_delay).await;
            }
        }
        if create_total == 0 {
            reporter.report(0, 0, 50, 100, "No events to create");
        }

        reporter.finish("Sync complete");
        info!(
            "Sync done: {} deleted, {} kept, {} created, {} failed",
            report.deleted,
            report.kept,
            report.created,
            report.failed.len()
        );
        Ok(report)
    }

    /// Insert one event, retrying rate-limit errors with doubling backoff up
    /// to the retry cap. Other errors surface immediately.
    async fn insert_with_retry(&self, calendar_id: &str, payload: &EventPayload) -> SyncResult<()> {
        let mut delay = self.base_backoff;
        let mut attempt = 1;
        loop {
            match self.api.insert(calendar_id, payload).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_rate_limit() && attempt < self.max_retries => {
                    warn!(
                        "Rate limited creating '{}' (attempt {}), backing off {:?}",
                        payload.summary, attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// RFC 3339 bounds of a calendar month in the given timezone
pub fn month_window(month: u32, year: i32, timezone: &str) -> SyncResult<(String, String)> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| Error::Config(format!("Unknown timezone: {}", timezone)))?;

    let start_date = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::Config(format!("Invalid month {}/{}", month, year)))?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end_date = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| Error::Config(format!("Invalid month {}/{}", next_month, next_year)))?;

    let to_rfc3339 = |date: NaiveDate| -> SyncResult<String> {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::Other("Invalid midnight".to_string()))?;
        let anchored = tz
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| Error::Other(format!("Unrepresentable local time {}", naive)))?;
        Ok(anchored.to_rfc3339())
    };

    Ok((to_rfc3339(start_date)?, to_rfc3339(end_date)?))
}
