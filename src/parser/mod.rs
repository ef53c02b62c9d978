pub mod beneficiaries;
pub mod detector;
pub mod grid;
pub mod header;
pub mod normalize;
pub mod segment;
pub mod text;

use crate::document::DocumentText;
use crate::error::SyncResult;
use crate::model::ParseOutcome;
use crate::settings::EntitySettings;
use detector::{detect_format, ScheduleFormat};
use grid::GridStrategy;
use header::extract_header_meta;
use std::collections::HashMap;
use text::FreeTextStrategy;
use tracing::info;

/// Parse one schedule document into an immutable outcome: normalized
/// entries, beneficiaries missing from the settings table, and non-fatal
/// warnings. The function holds no state; concurrent calls are safe.
pub fn parse_document(
    doc: &DocumentText,
    settings: &HashMap<String, EntitySettings>,
    corrections: &HashMap<String, String>,
) -> SyncResult<ParseOutcome> {
    let format = detect_format(doc.first_page())?;
    let header = extract_header_meta(doc.first_page())?;
    info!(
        "Parsing {:?} document for {}/{}",
        format, header.month, header.year
    );

    let (entries, warnings) = match format {
        ScheduleFormat::Grid => GridStrategy.extract(doc.first_page(), &header, corrections)?,
        ScheduleFormat::FreeText => {
            FreeTextStrategy.extract(&doc.full_text(), &header, corrections)?
        }
    };

    let names: Vec<String> = entries.iter().map(|e| e.normalized_name.clone()).collect();
    let unknown_beneficiaries =
        beneficiaries::collect_unknowns(&names, settings, doc.detail_page(), corrections);

    info!(
        "Parsed {} entries, {} unknown beneficiaries, {} warnings",
        entries.len(),
        unknown_beneficiaries.len(),
        warnings.len()
    );

    Ok(ParseOutcome {
        entries,
        unknown_beneficiaries,
        warnings,
    })
}
