use crate::error::SyncResult;
use crate::model::{ParseWarning, ScheduleEntry};
use crate::parser::header::HeaderMeta;
use crate::parser::normalize::normalize_name;
use crate::parser::segment::is_break;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

lazy_static! {
    /// A line listing day numbers: "3 4 5 10"
    static ref DAY_LINE_RE: Regex = Regex::new(r"^(\d+\s+)+\d+$").expect("day line regex");
    /// An appointment line: "08:00 - DUPONT Jean", optionally with an end
    /// time: "08:00 - 10:00 DUPONT Jean"
    static ref APPOINTMENT_RE: Regex = Regex::new(
        r"(?i)^(\d{1,2})[:h.](\d{2})\s*[-\u{2013}\u{2014}]\s*(?:(\d{1,2})[:h.](\d{2})\s+)?(.+)$"
    )
    .expect("appointment line regex");
}

/// Appointment length assumed when the line carries no end time
const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Free-text dialect: day-number lines are consumed left-to-right and
/// assigned positionally to the appointment lines that follow. This is a
/// best-effort mapping; a count mismatch is surfaced as a warning rather
/// than an error.
pub struct FreeTextStrategy;

impl FreeTextStrategy {
    pub fn extract(
        &self,
        full_text: &str,
        header: &HeaderMeta,
        corrections: &HashMap<String, String>,
    ) -> SyncResult<(Vec<ScheduleEntry>, Vec<ParseWarning>)> {
        let mut entries = Vec::new();
        let mut warnings = Vec::new();
        let mut pending_days: VecDeque<u32> = VecDeque::new();

        for line in full_text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if DAY_LINE_RE.is_match(trimmed) {
                for token in trimmed.split_whitespace() {
                    if let Ok(day) = token.parse::<u32>() {
                        if (1..=31).contains(&day) {
                            pending_days.push_back(day);
                        }
                    }
                }
                continue;
            }

            let Some(caps) = APPOINTMENT_RE.captures(trimmed) else {
                continue;
            };

            let Some(day) = pending_days.pop_front() else {
                warnings.push(ParseWarning::PositionalAssignment {
                    detail: format!("No day number left for appointment line '{}'", trimmed),
                });
                continue;
            };

            let (Ok(hour), Ok(minute)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
                continue;
            };
            if hour > 23 || minute > 59 {
                warnings.push(ParseWarning::MalformedSegment {
                    day,
                    detail: format!("Out-of-range time in '{}'", trimmed),
                });
                continue;
            }
            let start_time = format!("{:02}:{:02}", hour, minute);

            let end_time = match (caps.get(3), caps.get(4)) {
                (Some(eh), Some(em)) => {
                    let (Ok(eh), Ok(em)) = (eh.as_str().parse::<u32>(), em.as_str().parse::<u32>())
                    else {
                        continue;
                    };
                    if eh > 23 || em > 59 {
                        warnings.push(ParseWarning::MalformedSegment {
                            day,
                            detail: format!("Out-of-range end time in '{}'", trimmed),
                        });
                        continue;
                    }
                    format!("{:02}:{:02}", eh, em)
                }
                _ => {
                    let total = hour * 60 + minute + DEFAULT_DURATION_MINUTES;
                    format!("{:02}:{:02}", (total / 60) % 24, total % 60)
                }
            };

            let name = caps[5].trim().to_string();
            if is_break(&name) {
                continue;
            }

            let normalized = normalize_name(&name, corrections);
            match ScheduleEntry::new(
                day,
                header.month,
                header.year,
                start_time,
                end_time,
                name,
                normalized,
            ) {
                Ok(entry) => entries.push(entry),
                Err(e) => warnings.push(ParseWarning::MalformedSegment {
                    day,
                    detail: e.to_string(),
                }),
            }
        }

        if !pending_days.is_empty() {
            warnings.push(ParseWarning::PositionalAssignment {
                detail: format!("{} day numbers left unassigned", pending_days.len()),
            });
        }

        entries.sort_by_key(|e| (e.day, e.start_minutes().unwrap_or(0)));
        debug!("Free-text strategy extracted {} entries", entries.len());
        Ok((entries, warnings))
    }
}
