use crate::error::{Error, SyncResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Marker used for beneficiary contact fields that could not be harvested
pub const NOT_FOUND: &str = "Not found";

/// One normalized appointment extracted from a schedule document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Day of month (1-31)
    pub day: u32,
    /// Month (1-12), taken from the document header
    pub month: u32,
    /// Year, taken from the document header
    pub year: i32,
    /// Start time, HH:MM
    pub start_time: String,
    /// End time, HH:MM. May be earlier than start for overnight shifts
    pub end_time: String,
    /// Raw description text from the cell (usually the beneficiary name)
    pub description: String,
    /// Canonical "SURNAME, Given Names" form
    pub normalized_name: String,
    /// Per-entry color override, if the document carried one
    pub color_id: Option<String>,
    /// Per-entry description override
    pub event_description: Option<String>,
    /// Per-entry location override
    pub location: Option<String>,
}

impl ScheduleEntry {
    /// Build an entry, enforcing the model invariants: valid day and times,
    /// and at least one of normalized name / description non-empty so the
    /// entry has a usable identity.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        day: u32,
        month: u32,
        year: i32,
        start_time: String,
        end_time: String,
        description: String,
        normalized_name: String,
    ) -> SyncResult<Self> {
        if !(1..=31).contains(&day) {
            return Err(Error::MalformedSegment(format!("Invalid day: {}", day)));
        }
        if parse_hhmm(&start_time).is_none() {
            return Err(Error::MalformedSegment(format!(
                "Invalid start time: {}",
                start_time
            )));
        }
        if parse_hhmm(&end_time).is_none() {
            return Err(Error::MalformedSegment(format!(
                "Invalid end time: {}",
                end_time
            )));
        }
        if normalized_name.trim().is_empty() && description.trim().is_empty() {
            return Err(Error::MalformedSegment(
                "Entry has neither a name nor a description".to_string(),
            ));
        }

        Ok(Self {
            day,
            month,
            year,
            start_time,
            end_time,
            description,
            normalized_name,
            color_id: None,
            event_description: None,
            location: None,
        })
    }

    /// Identity key used by the diff engine: name (or description when the
    /// name is empty) plus the full date.
    pub fn identity_key(&self) -> String {
        let who = if self.normalized_name.is_empty() {
            &self.description
        } else {
            &self.normalized_name
        };
        format!("{}|{}|{}|{}", who, self.year, self.month, self.day)
    }

    /// Appointment duration in minutes. An end before the start is treated
    /// as an overnight shift, not an error.
    pub fn duration_minutes(&self) -> Option<i64> {
        duration_minutes(&self.start_time, &self.end_time)
    }

    /// Minutes from midnight to the start time, for same-day ordering
    pub fn start_minutes(&self) -> Option<i64> {
        let (h, m) = parse_hhmm(&self.start_time)?;
        Some(i64::from(h) * 60 + i64::from(m))
    }

    /// Minutes from midnight to the end time
    pub fn end_minutes(&self) -> Option<i64> {
        let (h, m) = parse_hhmm(&self.end_time)?;
        Some(i64::from(h) * 60 + i64::from(m))
    }
}

/// Parse an HH:MM string with bounds checks
pub fn parse_hhmm(time_str: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hour = parts[0].parse::<u32>().ok()?;
    let minute = parts[1].parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Duration in minutes between two HH:MM times, rolling over midnight when
/// the end precedes the start
pub fn duration_minutes(start: &str, end: &str) -> Option<i64> {
    let (sh, sm) = parse_hhmm(start)?;
    let (eh, em) = parse_hhmm(end)?;
    let start_min = i64::from(sh) * 60 + i64::from(sm);
    let mut end_min = i64::from(eh) * 60 + i64::from(em);
    if end_min < start_min {
        end_min += 24 * 60;
    }
    Some(end_min - start_min)
}

/// Contact metadata harvested for a beneficiary absent from the settings table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryInfo {
    pub telephone: String,
    pub location: String,
    pub full_description: String,
}

impl BeneficiaryInfo {
    /// Info with every field marked as missing
    pub fn not_found() -> Self {
        Self {
            telephone: NOT_FOUND.to_string(),
            location: NOT_FOUND.to_string(),
            full_description: NOT_FOUND.to_string(),
        }
    }
}

/// Non-fatal issues encountered while parsing a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    /// A segment inside a cell could not be parsed and was skipped
    MalformedSegment { day: u32, detail: String },
    /// Text-strategy day numbers did not line up 1:1 with appointment lines
    PositionalAssignment { detail: String },
    /// A cancellation row removed an extracted appointment
    CancelledAppointment { day: u32, time: String, name: String },
}

/// Immutable result of parsing one document
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub entries: Vec<ScheduleEntry>,
    pub unknown_beneficiaries: HashMap<String, BeneficiaryInfo>,
    pub warnings: Vec<ParseWarning>,
}

/// Point-in-time capture of a parsed schedule, one side of a diff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub appointments: Vec<ScheduleEntry>,
    pub month: u32,
    pub year: i32,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture a snapshot of the given entries
    pub fn from_entries(appointments: Vec<ScheduleEntry>, month: u32, year: i32) -> Self {
        Self {
            appointments,
            month,
            year,
            created_at: Utc::now(),
        }
    }
}
