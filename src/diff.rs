use crate::model::{ScheduleEntry, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

/// One entry changed in place between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedEntry {
    pub key: String,
    pub before: ScheduleEntry,
    pub after: ScheduleEntry,
    /// Names of the fields that differ
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub total: usize,
}

/// Semantic difference between two snapshots
#[derive(Debug, Clone, Serialize)]
pub struct DiffResult {
    pub added: Vec<ScheduleEntry>,
    pub deleted: Vec<ScheduleEntry>,
    pub modified: Vec<ModifiedEntry>,
    pub summary: DiffSummary,
}

/// Fields compared when deciding whether a paired entry was modified
const COMPARED_FIELDS: [&str; 4] = ["start_time", "end_time", "location", "event_description"];

/// Compute added/deleted/modified sets between two snapshots.
///
/// Entries are grouped by identity key; within a key, entries are paired by
/// stable list order up to the shorter side's length and compared field by
/// field; surplus entries are added (after side) or deleted (before side).
/// Multiple same-day entries sharing a key can therefore surface a true
/// modification as an add/delete pair; that trade-off is accepted.
pub fn diff(before: &Snapshot, after: &Snapshot) -> DiffResult {
    let before_map = key_map(&before.appointments);
    let after_map = key_map(&after.appointments);

    let mut added = Vec::new();
    let mut deleted = Vec::new();
    let mut modified = Vec::new();

    let mut keys: Vec<&String> = before_map.keys().chain(after_map.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let empty = Vec::new();
        let before_list = before_map.get(key).unwrap_or(&empty);
        let after_list = after_map.get(key).unwrap_or(&empty);

        let paired = before_list.len().min(after_list.len());
        for i in 0..paired {
            let (b, a) = (before_list[i], after_list[i]);
            let changes = changed_fields(b, a);
            if !changes.is_empty() {
                modified.push(ModifiedEntry {
                    key: key.clone(),
                    before: b.clone(),
                    after: a.clone(),
                    changes,
                });
            }
        }

        deleted.extend(before_list[paired..].iter().map(|e| (*e).clone()));
        added.extend(after_list[paired..].iter().map(|e| (*e).clone()));
    }

    let summary = DiffSummary {
        added: added.len(),
        deleted: deleted.len(),
        modified: modified.len(),
        total: added.len() + deleted.len() + modified.len(),
    };

    DiffResult {
        added,
        deleted,
        modified,
        summary,
    }
}

/// Group entries by identity key, preserving input order inside each key
fn key_map(entries: &[ScheduleEntry]) -> BTreeMap<String, Vec<&ScheduleEntry>> {
    let mut map: BTreeMap<String, Vec<&ScheduleEntry>> = BTreeMap::new();
    for entry in entries {
        map.entry(entry.identity_key()).or_default().push(entry);
    }
    map
}

fn changed_fields(before: &ScheduleEntry, after: &ScheduleEntry) -> Vec<String> {
    let pairs = [
        (before.start_time != after.start_time),
        (before.end_time != after.end_time),
        (before.location != after.location),
        (before.event_description != after.event_description),
    ];
    COMPARED_FIELDS
        .iter()
        .zip(pairs)
        .filter(|(_, changed)| *changed)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u32, name: &str, start: &str, end: &str) -> ScheduleEntry {
        ScheduleEntry::new(day, 3, 2025, start.into(), end.into(), name.into(), name.into())
            .unwrap()
    }

    fn snapshot(entries: Vec<ScheduleEntry>) -> Snapshot {
        Snapshot::from_entries(entries, 3, 2025)
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let s = snapshot(vec![entry(1, "A", "08:00", "10:00"), entry(2, "B", "09:00", "11:00")]);
        let result = diff(&s, &s);
        assert!(result.added.is_empty());
        assert!(result.deleted.is_empty());
        assert!(result.modified.is_empty());
        assert_eq!(result.summary.total, 0);
    }

    #[test]
    fn location_only_change_is_one_modified() {
        let before = snapshot(vec![entry(1, "A", "08:00", "10:00")]);
        let mut changed = entry(1, "A", "08:00", "10:00");
        changed.location = Some("Lyon".to_string());
        let after = snapshot(vec![changed]);

        let result = diff(&before, &after);
        assert!(result.added.is_empty());
        assert!(result.deleted.is_empty());
        assert_eq!(result.modified.len(), 1);
        assert_eq!(result.modified[0].changes, vec!["location".to_string()]);
    }

    #[test]
    fn added_and_deleted_classified() {
        let before = snapshot(vec![entry(1, "A", "08:00", "10:00")]);
        let after = snapshot(vec![entry(2, "B", "09:00", "11:00")]);

        let result = diff(&before, &after);
        assert_eq!(result.deleted.len(), 1);
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.summary.total, 2);
    }

    #[test]
    fn surplus_same_key_entries_are_added() {
        let before = snapshot(vec![entry(1, "A", "08:00", "10:00")]);
        let after = snapshot(vec![
            entry(1, "A", "08:00", "10:00"),
            entry(1, "A", "14:00", "16:00"),
        ]);

        let result = diff(&before, &after);
        assert!(result.modified.is_empty());
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.added[0].start_time, "14:00");
    }

    #[test]
    fn diff_is_stable_across_runs() {
        let before = snapshot(vec![entry(1, "A", "08:00", "10:00"), entry(3, "C", "07:00", "08:00")]);
        let after = snapshot(vec![entry(2, "B", "09:00", "11:00")]);

        let first = diff(&before, &after);
        let second = diff(&before, &after);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
