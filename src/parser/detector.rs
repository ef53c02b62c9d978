use crate::error::{Error, SyncResult};
use crate::parser::normalize::strip_diacritics;

/// Known schedule document dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFormat {
    /// Monthly table with one column per weekday
    Grid,
    /// Free-text export, day-number lines followed by appointment lines
    FreeText,
}

/// Header phrase identifying the grid dialect
const GRID_SIGNATURE: &str = "planning mensuel";

/// Header phrase identifying the free-text dialect
const TEXT_SIGNATURE: &str = "planning des interventions";

/// Select a parser strategy from the first-page text.
///
/// Matching is signature based: a fixed header phrase must appear. Unknown
/// or ambiguous headers fail closed rather than guessing a dialect.
pub fn detect_format(first_page: &str) -> SyncResult<ScheduleFormat> {
    let cleaned = strip_diacritics(first_page).to_lowercase();

    let grid = cleaned.contains(GRID_SIGNATURE);
    let text = cleaned.contains(TEXT_SIGNATURE);

    match (grid, text) {
        (true, false) => Ok(ScheduleFormat::Grid),
        (false, true) => Ok(ScheduleFormat::FreeText),
        (true, true) => Err(Error::UnknownDocumentFormat(
            "Header matches more than one known signature".to_string(),
        )),
        (false, false) => Err(Error::UnknownDocumentFormat(
            "First page matches no known header signature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_grid() {
        let format = detect_format("PLANNING MENSUEL - Mars 2025\nLundi Mardi").unwrap();
        assert_eq!(format, ScheduleFormat::Grid);
    }

    #[test]
    fn detects_free_text() {
        let format = detect_format("Planning des interventions Mars 2025").unwrap();
        assert_eq!(format, ScheduleFormat::FreeText);
    }

    #[test]
    fn unknown_header_fails_closed() {
        assert!(detect_format("Facture - Mars 2025").is_err());
    }

    #[test]
    fn ambiguous_header_fails_closed() {
        let both = "planning mensuel planning des interventions";
        assert!(detect_format(both).is_err());
    }
}
