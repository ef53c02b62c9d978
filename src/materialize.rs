use crate::calendar::models::{EventDateTime, EventPayload};
use crate::error::{Error, SyncResult};
use crate::model::{parse_hhmm, ScheduleEntry};
use crate::settings::{EntitySettings, DEFAULT_KEY};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

/// Provenance line stamped into every materialized event description
pub const PROVENANCE_LABEL: &str = "Importé depuis le planning";

/// Merge a schedule entry with the settings table into a calendar-ready
/// event payload.
///
/// Field precedence: explicit non-blank per-entry value, then the settings
/// entry for the normalized name (exact match, then case-insensitive), then
/// the DEFAULT settings entry.
pub fn materialize(
    entry: &ScheduleEntry,
    settings: &HashMap<String, EntitySettings>,
    timezone: &str,
    created_at: DateTime<Utc>,
) -> SyncResult<EventPayload> {
    let resolved = resolve_settings(&entry.normalized_name, settings);

    let color_id = first_non_blank(&[
        entry.color_id.as_deref(),
        resolved.map(|s| s.color_id.as_str()),
    ]);
    let location = first_non_blank(&[
        entry.location.as_deref(),
        resolved.map(|s| s.location.as_str()),
    ])
    .unwrap_or_default();
    let base_description = first_non_blank(&[
        entry.event_description.as_deref(),
        resolved.map(|s| s.description.as_str()),
    ])
    .unwrap_or_default();

    // The resolved description is appended, never silently dropped
    let mut description_lines = vec![
        created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        PROVENANCE_LABEL.to_string(),
    ];
    if !base_description.is_empty() {
        description_lines.push(base_description);
    }

    let summary = if entry.normalized_name.is_empty() {
        entry.description.clone()
    } else {
        entry.normalized_name.clone()
    };

    let (start, end) = event_times(entry, timezone)?;

    Ok(EventPayload {
        summary,
        description: description_lines.join("\n"),
        location,
        color_id,
        start,
        end,
        recurrence: None,
    })
}

/// Settings entry for a name: exact, then case-insensitive, then DEFAULT
fn resolve_settings<'a>(
    name: &str,
    settings: &'a HashMap<String, EntitySettings>,
) -> Option<&'a EntitySettings> {
    if let Some(found) = settings.get(name) {
        return Some(found);
    }
    let lowered = name.to_lowercase();
    settings
        .iter()
        .filter(|(key, _)| *key != DEFAULT_KEY)
        .find(|(key, _)| key.to_lowercase() == lowered)
        .map(|(_, value)| value)
        .or_else(|| settings.get(DEFAULT_KEY))
}

fn first_non_blank(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
        .map(|v| v.to_string())
}

/// Timezone-anchored start and end for an entry; an end before the start
/// rolls to the next day.
fn event_times(entry: &ScheduleEntry, timezone: &str) -> SyncResult<(EventDateTime, EventDateTime)> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| Error::Config(format!("Unknown timezone: {}", timezone)))?;

    let date = NaiveDate::from_ymd_opt(entry.year, entry.month, entry.day).ok_or_else(|| {
        Error::MalformedSegment(format!(
            "Invalid date {}-{:02}-{:02}",
            entry.year, entry.month, entry.day
        ))
    })?;

    let (sh, sm) = parse_hhmm(&entry.start_time)
        .ok_or_else(|| Error::MalformedSegment(format!("Invalid time {}", entry.start_time)))?;
    let (eh, em) = parse_hhmm(&entry.end_time)
        .ok_or_else(|| Error::MalformedSegment(format!("Invalid time {}", entry.end_time)))?;

    let start_naive = date
        .and_hms_opt(sh, sm, 0)
        .ok_or_else(|| Error::MalformedSegment(format!("Invalid time {}", entry.start_time)))?;

    let end_date = if (eh, em) < (sh, sm) {
        date + Duration::days(1)
    } else {
        date
    };
    let end_naive = end_date
        .and_hms_opt(eh, em, 0)
        .ok_or_else(|| Error::MalformedSegment(format!("Invalid time {}", entry.end_time)))?;

    let start = tz
        .from_local_datetime(&start_naive)
        .earliest()
        .ok_or_else(|| Error::Other(format!("Unrepresentable local time {}", start_naive)))?;
    let end = tz
        .from_local_datetime(&end_naive)
        .earliest()
        .ok_or_else(|| Error::Other(format!("Unrepresentable local time {}", end_naive)))?;

    Ok((
        EventDateTime {
            date_time: start.to_rfc3339(),
            time_zone: timezone.to_string(),
        },
        EventDateTime {
            date_time: end.to_rfc3339(),
            time_zone: timezone.to_string(),
        },
    ))
}
