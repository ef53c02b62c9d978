use chrono::Utc;
use planicare::diff::diff;
use planicare::document::DocumentText;
use planicare::gaps::find_gaps;
use planicare::materialize::materialize;
use planicare::model::{Snapshot, NOT_FOUND};
use planicare::parser::normalize::normalize_name;
use planicare::parser::parse_document;
use planicare::settings::{EntitySettings, DEFAULT_KEY};
use std::collections::HashMap;

const GRID_DOC: &str = "\
Planning mensuel - Mars 2025
| Lundi | Mardi |
| 03 Total 4h00 | 04 |
| 08:00-10:00 | 09:00-11:00 |
| DUPONT Jean | LEFEVRE Hélène |
| 10:15-11:00 | 12:00-13:00 |
| DUPONT Jean | Temps de pause repas |
\u{0C}\
Bénéficiaires
DUPONT Jean (BEN-042) 06 12 34 56 78 12 rue des Lilas, Lyon
LEFEVRE Hélène (BEN-051) 04 78 00 11 22 Villeurbanne";

fn settings() -> HashMap<String, EntitySettings> {
    let mut map = HashMap::new();
    map.insert(
        "DUPONT, Jean".to_string(),
        EntitySettings {
            color_id: "5".to_string(),
            description: "Aide au lever".to_string(),
            location: "12 rue des Lilas, Lyon".to_string(),
        },
    );
    map.insert(
        DEFAULT_KEY.to_string(),
        EntitySettings {
            color_id: "1".to_string(),
            description: "Intervention".to_string(),
            location: String::new(),
        },
    );
    map
}

#[test]
fn grid_document_end_to_end() {
    let doc = DocumentText::from_text(GRID_DOC);
    let outcome = parse_document(&doc, &settings(), &HashMap::new()).unwrap();

    // Break slot filtered out, three real appointments remain
    assert_eq!(outcome.entries.len(), 3);
    let first = &outcome.entries[0];
    assert_eq!(first.day, 3);
    assert_eq!(first.month, 3);
    assert_eq!(first.year, 2025);
    assert_eq!(first.start_time, "08:00");
    assert_eq!(first.end_time, "10:00");
    assert_eq!(first.normalized_name, "DUPONT, Jean");

    // LEFEVRE is missing from the settings table and gets harvested from
    // the detail page
    assert_eq!(outcome.unknown_beneficiaries.len(), 1);
    let info = &outcome.unknown_beneficiaries["LEFEVRE, Helene"];
    assert_eq!(info.telephone, "04 78 00 11 22");
    assert_ne!(info.location, NOT_FOUND);
}

#[test]
fn tight_turnaround_is_flagged() {
    let doc = DocumentText::from_text(GRID_DOC);
    let outcome = parse_document(&doc, &settings(), &HashMap::new()).unwrap();

    // 10:00 -> 10:15 leaves only 15 minutes on day 3
    let warnings = find_gaps(&outcome.entries, 30);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].day, 3);
    assert_eq!(warnings[0].gap_minutes, 15);
}

#[test]
fn entries_materialize_with_settings() {
    let doc = DocumentText::from_text(GRID_DOC);
    let outcome = parse_document(&doc, &settings(), &HashMap::new()).unwrap();
    let table = settings();

    let payload = materialize(&outcome.entries[0], &table, "Europe/Paris", Utc::now()).unwrap();
    assert_eq!(payload.summary, "DUPONT, Jean");
    assert_eq!(payload.color_id.as_deref(), Some("5"));
    assert!(payload.start.date_time.starts_with("2025-03-03T08:00:00"));

    // Unknown beneficiary falls back to DEFAULT settings
    let lefevre = outcome
        .entries
        .iter()
        .find(|e| e.normalized_name == "LEFEVRE, Helene")
        .unwrap();
    let payload = materialize(lefevre, &table, "Europe/Paris", Utc::now()).unwrap();
    assert_eq!(payload.color_id.as_deref(), Some("1"));
}

#[test]
fn successive_imports_diff_cleanly() {
    let doc = DocumentText::from_text(GRID_DOC);
    let outcome = parse_document(&doc, &settings(), &HashMap::new()).unwrap();

    let before = Snapshot::from_entries(outcome.entries.clone(), 3, 2025);

    // Same import again: nothing changed
    let unchanged = Snapshot::from_entries(outcome.entries.clone(), 3, 2025);
    let result = diff(&before, &unchanged);
    assert_eq!(result.summary.total, 0);

    // One appointment moves by an hour
    let mut moved = outcome.entries.clone();
    moved[0].start_time = "09:00".to_string();
    moved[0].end_time = "11:00".to_string();
    let after = Snapshot::from_entries(moved, 3, 2025);

    let result = diff(&before, &after);
    assert_eq!(result.summary.modified, 1);
    assert_eq!(result.summary.added, 0);
    assert_eq!(result.summary.deleted, 0);
    assert_eq!(
        result.modified[0].changes,
        vec!["start_time".to_string(), "end_time".to_string()]
    );
}

#[test]
fn unknown_format_rejected_before_parsing() {
    let doc = DocumentText::from_text("Facture - Mars 2025\n08:00-10:00\nDUPONT Jean");
    assert!(parse_document(&doc, &HashMap::new(), &HashMap::new()).is_err());
}

#[test]
fn missing_header_metadata_is_fatal() {
    let doc = DocumentText::from_text("Planning mensuel\n| Lundi | Mardi |\n| 03 | 04 |");
    assert!(parse_document(&doc, &HashMap::new(), &HashMap::new()).is_err());
}

#[test]
fn free_text_document_parses() {
    let doc = DocumentText::from_text(
        "Planning des interventions - Avril 2025\n7 8\n08h30 - DUPONT Jean\n14:00 - 15:30 MARTIN Paul",
    );
    let outcome = parse_document(&doc, &HashMap::new(), &HashMap::new()).unwrap();
    assert_eq!(outcome.entries.len(), 2);
    assert_eq!(outcome.entries[0].day, 7);
    assert_eq!(outcome.entries[0].start_time, "08:30");
    assert_eq!(outcome.entries[0].month, 4);
    assert_eq!(outcome.entries[1].end_time, "15:30");
}

#[test]
fn correction_table_applies_during_parse() {
    let mut corrections = HashMap::new();
    corrections.insert("dupond, jean".to_string(), "DUPONT, Jean".to_string());

    let doc = DocumentText::from_text(
        "Planning mensuel - Mars 2025\n| Lundi | Mardi |\n| 03 | 04 |\n| 08:00-10:00 | |\n| DUPOND Jean | |",
    );
    let outcome = parse_document(&doc, &settings(), &corrections).unwrap();
    assert_eq!(outcome.entries[0].normalized_name, "DUPONT, Jean");
    // Corrected to a known name, so no unknown beneficiary is reported
    assert!(outcome.unknown_beneficiaries.is_empty());
}

#[test]
fn normalization_idempotence_over_parsed_names() {
    let doc = DocumentText::from_text(GRID_DOC);
    let outcome = parse_document(&doc, &settings(), &HashMap::new()).unwrap();
    let corrections = HashMap::new();
    for entry in &outcome.entries {
        assert_eq!(
            normalize_name(&entry.normalized_name, &corrections),
            entry.normalized_name
        );
    }
}
