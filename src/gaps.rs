use crate::model::ScheduleEntry;
use crate::parser::segment::is_break;
use serde::Serialize;

/// Warning for two same-day appointments with too little buffer between them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GapWarning {
    pub day: u32,
    pub first_name: String,
    pub first_end: String,
    pub second_name: String,
    pub second_start: String,
    pub gap_minutes: i64,
}

/// Flag same-day consecutive appointment pairs whose buffer is shorter than
/// `threshold_minutes`. A gap of exactly the threshold is fine; overlapping
/// appointments (negative gap) are out of scope here and not reported.
pub fn find_gaps(entries: &[ScheduleEntry], threshold_minutes: i64) -> Vec<GapWarning> {
    let mut sorted: Vec<&ScheduleEntry> = entries
        .iter()
        .filter(|e| !is_break(&e.description))
        .collect();
    sorted.sort_by_key(|e| (e.day, e.start_minutes().unwrap_or(0)));

    let mut warnings = Vec::new();
    for pair in sorted.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if current.day != next.day {
            continue;
        }
        let (Some(end), Some(start)) = (current.end_minutes(), next.start_minutes()) else {
            continue;
        };
        let gap = start - end;
        if (0..threshold_minutes).contains(&gap) {
            warnings.push(GapWarning {
                day: current.day,
                first_name: current.normalized_name.clone(),
                first_end: current.end_time.clone(),
                second_name: next.normalized_name.clone(),
                second_start: next.start_time.clone(),
                gap_minutes: gap,
            });
        }
    }

    warnings
}
