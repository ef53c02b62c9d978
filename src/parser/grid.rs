use crate::error::SyncResult;
use crate::model::{ParseWarning, ScheduleEntry};
use crate::parser::header::HeaderMeta;
use crate::parser::normalize::{normalize_name, strip_diacritics};
use crate::parser::segment::segment_cell;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

lazy_static! {
    /// A day-number cell: "3", "01", "14 Total 6h30". The trailing total is
    /// administrative noise carried on the same cell.
    static ref DAY_NUMBER_RE: Regex =
        Regex::new(r"(?i)^(\d{1,2})(?:\s+total.*)?$").expect("day number regex");
    /// Cancellation row: day, time, beneficiary name
    static ref CANCEL_ROW_RE: Regex =
        Regex::new(r"(?i)^(\d{1,2})\s+(\d{1,2})[:h.](\d{2})\s+(.+)$").expect("cancel row regex");
    /// Pure totals row
    static ref TOTAL_ROW_RE: Regex = Regex::new(r"(?i)^total").expect("total row regex");
    /// Cell separator for whitespace-laid-out tables
    static ref CELL_SPLIT_RE: Regex = Regex::new(r"\t|\s{2,}").expect("cell split regex");
}

const WEEKDAYS: [&str; 7] = [
    "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
];

/// Grid dialect: a monthly table whose header row names weekdays and whose
/// day-number cells set the current day for their column until overridden.
pub struct GridStrategy;

impl GridStrategy {
    /// Extract all appointments from the first page's table, then subtract
    /// the cancellations table if one is present.
    pub fn extract(
        &self,
        first_page: &str,
        header: &HeaderMeta,
        corrections: &HashMap<String, String>,
    ) -> SyncResult<(Vec<ScheduleEntry>, Vec<ParseWarning>)> {
        let lines: Vec<&str> = first_page.lines().collect();

        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        // Locate the weekday header row and which columns carry days
        let mut day_columns: Vec<usize> = Vec::new();
        let mut header_row = None;
        for (i, line) in lines.iter().enumerate() {
            let cells = split_cells(line);
            let columns: Vec<usize> = cells
                .iter()
                .enumerate()
                .filter(|(_, c)| is_weekday(c))
                .map(|(idx, _)| idx)
                .collect();
            if columns.len() >= 2 {
                day_columns = columns;
                header_row = Some(i);
                break;
            }
        }

        let Some(header_row) = header_row else {
            debug!("No weekday header row found, grid yields no entries");
            return Ok((entries, warnings));
        };

        // The cancellations table, if any, ends the main table
        let cancel_start = lines
            .iter()
            .position(|l| strip_diacritics(l).to_lowercase().contains("annul"));
        let main_end = cancel_start.unwrap_or(lines.len());

        // Per-column state: the current day and the cell text accumulated
        // under it. Day numbers persist across rows until overridden.
        let mut current_day: HashMap<usize, u32> = HashMap::new();
        let mut buffers: HashMap<usize, Vec<String>> = HashMap::new();

        let flush = |col: usize,
                         current_day: &HashMap<usize, u32>,
                         buffers: &mut HashMap<usize, Vec<String>>,
                         entries: &mut Vec<ScheduleEntry>,
                         warnings: &mut Vec<ParseWarning>| {
            let Some(day) = current_day.get(&col).copied() else {
                buffers.remove(&col);
                return;
            };
            let Some(cell_lines) = buffers.remove(&col) else {
                return;
            };
            let cell_text = cell_lines.join("\n");
            let (segments, mut segment_warnings) = segment_cell(&cell_text, day);
            warnings.append(&mut segment_warnings);

            for segment in segments {
                let description = segment.text();
                let normalized = normalize_name(segment.headline(), corrections);
                match ScheduleEntry::new(
                    day,
                    header.month,
                    header.year,
                    segment.start_time.clone(),
                    segment.end_time.clone(),
                    description,
                    normalized,
                ) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warnings.push(ParseWarning::MalformedSegment {
                        day,
                        detail: e.to_string(),
                    }),
                }
            }
        };

        for line in &lines[header_row + 1..main_end] {
            let cells = split_cells(line);

            // Administrative totals rows carry no appointments
            let first_filled = cells.iter().find(|c| !c.is_empty());
            if matches!(first_filled, Some(c) if TOTAL_ROW_RE.is_match(c) && !DAY_NUMBER_RE.is_match(c))
            {
                continue;
            }

            for &col in &day_columns {
                let Some(cell) = cells.get(col) else { continue };
                if cell.is_empty() {
                    continue;
                }

                if let Some(caps) = DAY_NUMBER_RE.captures(cell) {
                    if let Ok(day) = caps[1].parse::<u32>() {
                        if (1..=31).contains(&day) {
                            // Accumulated text belongs to the previous day
                            flush(col, &current_day, &mut buffers, &mut entries, &mut warnings);
                            current_day.insert(col, day);
                            continue;
                        }
                    }
                }

                buffers.entry(col).or_default().push(cell.clone());
            }
        }

        for &col in &day_columns {
            flush(col, &current_day, &mut buffers, &mut entries, &mut warnings);
        }

        // Subtract cancelled interventions
        if let Some(start) = cancel_start {
            apply_cancellations(&lines[start + 1..], &mut entries, &mut warnings);
        }

        entries.sort_by_key(|e| (e.day, e.start_minutes().unwrap_or(0)));
        debug!("Grid strategy extracted {} entries", entries.len());
        Ok((entries, warnings))
    }
}

/// Remove entries matched by the cancellations table rows, by day + start
/// time + name substring.
fn apply_cancellations(
    lines: &[&str],
    entries: &mut Vec<ScheduleEntry>,
    warnings: &mut Vec<ParseWarning>,
) {
    for line in lines {
        let Some(caps) = CANCEL_ROW_RE.captures(line.trim()) else {
            continue;
        };
        let Ok(day) = caps[1].parse::<u32>() else {
            continue;
        };
        let (Ok(hour), Ok(minute)) = (caps[2].parse::<u32>(), caps[3].parse::<u32>()) else {
            continue;
        };
        let time = format!("{:02}:{:02}", hour, minute);
        let name = strip_diacritics(caps[4].trim()).to_lowercase();

        let before = entries.len();
        entries.retain(|entry| {
            let matches = entry.day == day
                && entry.start_time == time
                && (strip_diacritics(&entry.normalized_name)
                    .to_lowercase()
                    .contains(&name)
                    || strip_diacritics(&entry.description)
                        .to_lowercase()
                        .contains(&name));
            !matches
        });

        for _ in entries.len()..before {
            warnings.push(ParseWarning::CancelledAppointment {
                day,
                time: time.clone(),
                name: caps[4].trim().to_string(),
            });
        }
    }
}

/// True when the cell names a French weekday
fn is_weekday(cell: &str) -> bool {
    let cleaned = strip_diacritics(cell).to_lowercase();
    WEEKDAYS.iter().any(|d| cleaned.starts_with(d))
}

/// Split a table line into cells. Pipe-delimited lines split on `|`,
/// otherwise tabs or runs of two or more spaces separate cells.
pub fn split_cells(line: &str) -> Vec<String> {
    if line.contains('|') {
        line.split('|').map(|c| c.trim().to_string()).collect()
    } else {
        CELL_SPLIT_RE
            .split(line)
            .map(|c| c.trim().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> HeaderMeta {
        HeaderMeta { month: 3, year: 2025 }
    }

    fn no_corrections() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn day_number_with_total_suffix() {
        assert!(DAY_NUMBER_RE.is_match("01 Total 4h00"));
        assert!(DAY_NUMBER_RE.is_match("14"));
        assert!(!DAY_NUMBER_RE.is_match("Total 4h00"));
    }

    #[test]
    fn extracts_single_cell_scenario() {
        let page = "\
Planning mensuel Mars 2025
| Lundi | Mardi |
| 01 Total 4h00 | 02 |
| 08:00-10:00 | |
| DUPONT Jean | |";
        let (entries, warnings) = GridStrategy
            .extract(page, &header(), &no_corrections())
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.day, 1);
        assert_eq!(entry.start_time, "08:00");
        assert_eq!(entry.end_time, "10:00");
        assert_eq!(entry.normalized_name, "DUPONT, Jean");
    }

    #[test]
    fn day_numbers_persist_across_rows() {
        let page = "\
Planning mensuel Mars 2025
| Lundi | Mardi |
| 03 | 04 |
| 08:00-10:00 | 09:00-11:00 |
| DUPONT Jean | MARTIN Paul |
| 14:00-15:00 | |
| DUPONT Jean | |";
        let (entries, _) = GridStrategy
            .extract(page, &header(), &no_corrections())
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].day, 3);
        assert_eq!(entries[1].day, 3);
        assert_eq!(entries[1].start_time, "14:00");
        assert_eq!(entries[2].day, 4);
        assert_eq!(entries[2].normalized_name, "MARTIN, Paul");
    }

    #[test]
    fn totals_rows_are_skipped() {
        let page = "\
Planning mensuel Mars 2025
| Lundi | Mardi |
| 03 | 04 |
| 08:00-10:00 | |
| DUPONT Jean | |
| Total 2h00 | Total 0h00 |";
        let (entries, _) = GridStrategy
            .extract(page, &header(), &no_corrections())
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn cancellations_subtract_entries() {
        let page = "\
Planning mensuel Mars 2025
| Lundi | Mardi |
| 03 | 04 |
| 08:00-10:00 | 09:00-11:00 |
| DUPONT Jean | MARTIN Paul |
Interventions annulées
3 08:00 Dupont";
        let (entries, warnings) = GridStrategy
            .extract(page, &header(), &no_corrections())
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].normalized_name, "MARTIN, Paul");
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ParseWarning::CancelledAppointment { day: 3, .. })));
    }
}
