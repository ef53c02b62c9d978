use crate::model::{duration_minutes, ParseWarning};
use crate::parser::normalize::strip_diacritics;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Time range opening a segment. Tolerates `h`, `:` and `.` as
    /// hour/minute separators and hyphen / en dash / em dash between the
    /// two times: "8:00-10:00", "8h00 – 10h00", "08.00—10.00".
    static ref TIME_RANGE_RE: Regex =
        Regex::new(r"(?i)^\s*(\d{1,2})[:h.](\d{2})\s*[-\u{2013}\u{2014}]\s*(\d{1,2})[:h.](\d{2})\s*(.*)$")
            .expect("time range regex");
}

/// Words marking a break/meal slot; matched on diacritic-stripped lowercase
const BREAK_VOCABULARY: [&str; 5] = ["pause", "repas", "coupure", "dejeuner", "break"];

/// One time-bounded slice of a cell's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSegment {
    /// HH:MM
    pub start_time: String,
    /// HH:MM, may be earlier than start for overnight shifts
    pub end_time: String,
    /// Free-text lines accumulated after the time range
    pub lines: Vec<String>,
}

impl CellSegment {
    /// First non-empty free-text line, usually the beneficiary name
    pub fn headline(&self) -> &str {
        self.lines
            .iter()
            .map(String::as_str)
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
    }

    /// All free-text lines joined with single spaces
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Segment duration in minutes, overnight tolerant
    pub fn duration_minutes(&self) -> Option<i64> {
        duration_minutes(&self.start_time, &self.end_time)
    }
}

/// True when the text names a break or meal slot
pub fn is_break(text: &str) -> bool {
    let cleaned = strip_diacritics(text).to_lowercase();
    BREAK_VOCABULARY.iter().any(|word| cleaned.contains(word))
}

/// Split a cell's multi-line text into time-bounded segments.
///
/// A time-range line starts a new segment; following non-time lines
/// accumulate into it. Lines before the first time range are ignored.
/// Segments whose text matches the break vocabulary are dropped. A segment
/// with out-of-range hour/minute values is skipped with a warning, the rest
/// of the cell continues.
pub fn segment_cell(cell_text: &str, day: u32) -> (Vec<CellSegment>, Vec<ParseWarning>) {
    let mut segments = Vec::new();
    let mut warnings = Vec::new();
    let mut current: Option<CellSegment> = None;

    for line in cell_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(caps) = TIME_RANGE_RE.captures(trimmed) {
            if let Some(done) = current.take() {
                segments.push(done);
            }

            let (sh, sm, eh, em) = (
                caps[1].parse::<u32>().unwrap_or(99),
                caps[2].parse::<u32>().unwrap_or(99),
                caps[3].parse::<u32>().unwrap_or(99),
                caps[4].parse::<u32>().unwrap_or(99),
            );

            if sh > 23 || eh > 23 || sm > 59 || em > 59 {
                warnings.push(ParseWarning::MalformedSegment {
                    day,
                    detail: format!("Out-of-range time in '{}'", trimmed),
                });
                // The bad range does not own the following lines
                continue;
            }

            let mut segment = CellSegment {
                start_time: format!("{:02}:{:02}", sh, sm),
                end_time: format!("{:02}:{:02}", eh, em),
                lines: Vec::new(),
            };

            // Trailing text on the time-range line belongs to the segment
            let remainder = caps[5].trim();
            if !remainder.is_empty() {
                segment.lines.push(remainder.to_string());
            }

            current = Some(segment);
        } else if let Some(segment) = current.as_mut() {
            segment.lines.push(trimmed.to_string());
        }
    }

    if let Some(done) = current.take() {
        segments.push(done);
    }

    // Break/meal slots are internal bookkeeping, never surfaced
    segments.retain(|s| !is_break(&s.text()));

    (segments, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_with_name() {
        let (segments, warnings) = segment_cell("08:00-10:00\nDUPONT Jean", 1);
        assert!(warnings.is_empty());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_time, "08:00");
        assert_eq!(segments[0].end_time, "10:00");
        assert_eq!(segments[0].headline(), "DUPONT Jean");
    }

    #[test]
    fn tolerant_separators() {
        for cell in ["8h00 – 10h00\nX", "8.00—10.00\nX", "8:00 - 10:00\nX"] {
            let (segments, _) = segment_cell(cell, 1);
            assert_eq!(segments.len(), 1, "failed for {:?}", cell);
            assert_eq!(segments[0].start_time, "08:00");
            assert_eq!(segments[0].end_time, "10:00");
        }
    }

    #[test]
    fn multiple_segments_in_one_cell() {
        let cell = "08:00-10:00\nDUPONT Jean\n14:00-16:00\nMARTIN Paul";
        let (segments, _) = segment_cell(cell, 1);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].headline(), "MARTIN Paul");
    }

    #[test]
    fn break_segment_is_dropped() {
        let (segments, warnings) = segment_cell("12:00-13:00\nTemps de pause repas", 1);
        assert!(segments.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn invalid_segment_skipped_rest_survives() {
        let cell = "25:00-99:00\nGHOST\n08:00-09:00\nDUPONT Jean";
        let (segments, warnings) = segment_cell(cell, 4);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].headline(), "DUPONT Jean");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn overnight_duration() {
        let (segments, _) = segment_cell("22:00-02:00\nNuit DUPONT", 1);
        assert_eq!(segments[0].duration_minutes(), Some(240));
    }

    #[test]
    fn name_on_time_line() {
        let (segments, _) = segment_cell("08:00-10:00 DUPONT Jean", 1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].headline(), "DUPONT Jean");
    }
}
