use crate::error::{Error, SyncResult};
use crate::parser::normalize::strip_diacritics;
use lazy_static::lazy_static;
use regex::Regex;

/// French month names, index 0 = janvier. Lookup is done on
/// diacritic-stripped lowercase text so "février"/"fevrier" both match.
const MONTH_NAMES: [&str; 12] = [
    "janvier",
    "fevrier",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "aout",
    "septembre",
    "octobre",
    "novembre",
    "decembre",
];

lazy_static! {
    static ref MONTH_YEAR_RE: Regex = Regex::new(
        r"\b(janvier|fevrier|mars|avril|mai|juin|juillet|aout|septembre|octobre|novembre|decembre)\s+(\d{4})\b"
    )
    .expect("month/year regex");
}

/// Month and year extracted once from the document header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMeta {
    pub month: u32,
    pub year: i32,
}

/// Resolve a month name to its 1-based number
pub fn month_number(name: &str) -> Option<u32> {
    let cleaned = strip_diacritics(name).to_lowercase();
    MONTH_NAMES
        .iter()
        .position(|m| *m == cleaned)
        .map(|i| i as u32 + 1)
}

/// Extract month and year from the first-page header text.
///
/// Failure here is fatal for the whole document: without the header the
/// extracted day numbers cannot be anchored to dates.
pub fn extract_header_meta(first_page: &str) -> SyncResult<HeaderMeta> {
    let cleaned = strip_diacritics(first_page).to_lowercase();

    let captures = MONTH_YEAR_RE.captures(&cleaned).ok_or_else(|| {
        Error::HeaderMetadataMissing("No month/year token found in document header".to_string())
    })?;

    let month = month_number(&captures[1]).ok_or_else(|| {
        Error::HeaderMetadataMissing(format!("Unknown month name: {}", &captures[1]))
    })?;

    let year = captures[2].parse::<i32>().map_err(|_| {
        Error::HeaderMetadataMissing(format!("Invalid year token: {}", &captures[2]))
    })?;

    Ok(HeaderMeta { month, year })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_month_and_year() {
        let meta = extract_header_meta("Planning mensuel - Mars 2025").unwrap();
        assert_eq!(meta, HeaderMeta { month: 3, year: 2025 });
    }

    #[test]
    fn accented_month_matches() {
        let meta = extract_header_meta("Planning Février 2024").unwrap();
        assert_eq!(meta, HeaderMeta { month: 2, year: 2024 });
    }

    #[test]
    fn missing_header_is_an_error() {
        assert!(extract_header_meta("no date here").is_err());
    }

    #[test]
    fn month_numbers() {
        assert_eq!(month_number("août"), Some(8));
        assert_eq!(month_number("décembre"), Some(12));
        assert_eq!(month_number("smarch"), None);
    }
}
