use std::collections::HashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics by NFD-decomposing and dropping combining marks
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Canonicalize a person name to `"SURNAME, Given Names"`.
///
/// The first whitespace token is treated as the surname and forced to upper
/// case; remaining tokens are title-cased given names. The correction table
/// (wrong form -> correct form, keyed case-insensitively) is applied as a
/// final override. The function is idempotent.
pub fn normalize_name(raw: &str, corrections: &HashMap<String, String>) -> String {
    // Commas from an already-normalized input must not stick to tokens
    let stripped = strip_diacritics(raw).replace(',', " ");
    let tokens: Vec<&str> = stripped.split_whitespace().collect();

    let normalized = match tokens.split_first() {
        None => String::new(),
        Some((surname, rest)) => {
            let surname = surname.to_uppercase();
            if rest.is_empty() {
                surname
            } else {
                let given: Vec<String> = rest.iter().map(|t| title_case(t)).collect();
                format!("{}, {}", surname, given.join(" "))
            }
        }
    };

    // Final override pass through the correction table
    let key = normalized.to_lowercase();
    corrections
        .iter()
        .find(|(wrong, _)| wrong.to_lowercase() == key)
        .map(|(_, correct)| correct.clone())
        .unwrap_or(normalized)
}

/// Title-case one token, keeping hyphenated parts ("jean-pierre" -> "Jean-Pierre")
fn title_case(token: &str) -> String {
    token
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_corrections() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn basic_normalization() {
        assert_eq!(
            normalize_name("DUPONT Jean", &no_corrections()),
            "DUPONT, Jean"
        );
        assert_eq!(
            normalize_name("dupont jean", &no_corrections()),
            "DUPONT, Jean"
        );
    }

    #[test]
    fn diacritics_are_stripped() {
        assert_eq!(
            normalize_name("Lefèvre Hélène", &no_corrections()),
            "LEFEVRE, Helene"
        );
    }

    #[test]
    fn hyphenated_given_names() {
        assert_eq!(
            normalize_name("MARTIN jean-pierre", &no_corrections()),
            "MARTIN, Jean-Pierre"
        );
    }

    #[test]
    fn surname_only() {
        assert_eq!(normalize_name("Dupont", &no_corrections()), "DUPONT");
    }

    #[test]
    fn normalization_is_idempotent() {
        let corrections = no_corrections();
        for raw in ["DUPONT Jean", "lefèvre hélène marie", "MARTIN jean-pierre", "Dupont"] {
            let once = normalize_name(raw, &corrections);
            let twice = normalize_name(&once, &corrections);
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn correction_table_overrides() {
        let mut corrections = HashMap::new();
        corrections.insert("dupond, jean".to_string(), "DUPONT, Jean".to_string());
        assert_eq!(
            normalize_name("Dupond Jean", &corrections),
            "DUPONT, Jean"
        );
        // Corrected output is stable under renormalization
        assert_eq!(
            normalize_name("DUPONT, Jean", &corrections),
            "DUPONT, Jean"
        );
    }
}
