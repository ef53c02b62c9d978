use crate::error::SyncResult;
use crate::model::{BeneficiaryInfo, NOT_FOUND};
use crate::parser::normalize::{normalize_name, strip_diacritics};
use crate::settings::{EntitySettings, SettingsRepository, DEFAULT_KEY};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info};

lazy_static! {
    /// Contact table row: name, parenthesized code, free text and phone
    static ref CONTACT_ROW_RE: Regex =
        Regex::new(r"(?m)^\s*(?P<name>[^(\n]+?)\s*\((?P<code>[^)]+)\)\s*(?P<rest>.+)$")
            .expect("contact row regex");
    /// French phone number: "06 12 34 56 78", "06.12.34.56.78", "0612345678"
    static ref PHONE_RE: Regex =
        Regex::new(r"0\d(?:[\s.]?\d{2}){4}").expect("phone regex");
}

/// Color ids cycle through the Google Calendar palette
const COLOR_ID_RANGE: u32 = 11;

/// Find contact details for every normalized name missing from the settings
/// table. The primary source is the contact table on the detail page; when a
/// name has no table row, a phone/location heuristic runs over any line
/// mentioning the surname. Fields that cannot be harvested are marked
/// "Not found".
pub fn collect_unknowns(
    names: &[String],
    settings: &HashMap<String, EntitySettings>,
    detail_page: &str,
    corrections: &HashMap<String, String>,
) -> HashMap<String, BeneficiaryInfo> {
    let mut unknowns = HashMap::new();

    for name in names {
        if name.is_empty() || name == DEFAULT_KEY || settings.contains_key(name) {
            continue;
        }
        if unknowns.contains_key(name) {
            continue;
        }

        let info = lookup_contact(name, detail_page, corrections)
            .or_else(|| heuristic_lookup(name, detail_page))
            .unwrap_or_else(BeneficiaryInfo::not_found);

        debug!("Unknown beneficiary {}: tel {}", name, info.telephone);
        unknowns.insert(name.clone(), info);
    }

    unknowns
}

/// Exact lookup in the detail page's contact table
fn lookup_contact(
    target: &str,
    detail_page: &str,
    corrections: &HashMap<String, String>,
) -> Option<BeneficiaryInfo> {
    for caps in CONTACT_ROW_RE.captures_iter(detail_page) {
        let row_name = normalize_name(caps.name("name")?.as_str(), corrections);
        if row_name != target {
            continue;
        }

        let rest = caps.name("rest")?.as_str();
        let (telephone, location) = harvest_phone_and_location(rest);
        return Some(BeneficiaryInfo {
            telephone,
            location,
            full_description: caps.get(0)?.as_str().trim().to_string(),
        });
    }
    None
}

/// Fallback: any detail-page line mentioning the surname
fn heuristic_lookup(target: &str, detail_page: &str) -> Option<BeneficiaryInfo> {
    let surname = target.split(',').next()?.trim();
    if surname.is_empty() {
        return None;
    }
    let surname = strip_diacritics(surname).to_lowercase();

    for line in detail_page.lines() {
        let cleaned = strip_diacritics(line).to_lowercase();
        if !cleaned.contains(&surname) {
            continue;
        }

        let (telephone, location) = harvest_phone_and_location(line);
        if telephone == NOT_FOUND && location == NOT_FOUND {
            continue;
        }
        return Some(BeneficiaryInfo {
            telephone,
            location,
            full_description: line.trim().to_string(),
        });
    }
    None
}

/// Pull a phone number and the trailing location text out of a segment
fn harvest_phone_and_location(segment: &str) -> (String, String) {
    match PHONE_RE.find(segment) {
        Some(phone) => {
            let trailing = segment[phone.end()..].trim_matches([' ', ',', '-']).trim();
            let leading = segment[..phone.start()].trim_matches([' ', ',', '-']).trim();
            let location = if !trailing.is_empty() {
                trailing.to_string()
            } else if !leading.is_empty() {
                leading.to_string()
            } else {
                NOT_FOUND.to_string()
            };
            (phone.as_str().to_string(), location)
        }
        None => {
            let text = segment.trim();
            if text.is_empty() {
                (NOT_FOUND.to_string(), NOT_FOUND.to_string())
            } else {
                (NOT_FOUND.to_string(), text.to_string())
            }
        }
    }
}

/// Register collected unknowns into the settings table: each gets the next
/// unused color id (cycling 1-11) and a description built from the harvested
/// phone number. Returns the names registered.
pub async fn auto_register(
    unknowns: &HashMap<String, BeneficiaryInfo>,
    repo: &dyn SettingsRepository,
) -> SyncResult<Vec<String>> {
    let existing = repo.all().await?;
    let mut used: Vec<u32> = existing
        .values()
        .filter_map(|s| s.color_id.parse::<u32>().ok())
        .collect();

    let mut registered = Vec::new();
    let mut names: Vec<&String> = unknowns.keys().collect();
    names.sort();

    for name in names {
        if existing.contains_key(name.as_str()) {
            continue;
        }
        let info = &unknowns[name];

        let color = next_color_id(&used);
        used.push(color);

        let description = if info.telephone == NOT_FOUND {
            "Nouveau bénéficiaire".to_string()
        } else {
            format!("Tél: {}", info.telephone)
        };
        let location = if info.location == NOT_FOUND {
            String::new()
        } else {
            info.location.clone()
        };

        repo.put(
            name,
            EntitySettings {
                color_id: color.to_string(),
                description,
                location,
            },
        )
        .await?;

        info!("Auto-registered {} with color {}", name, color);
        registered.push(name.clone());
    }

    Ok(registered)
}

/// Smallest color id in 1..=11 not yet used; once all are taken, cycle by
/// usage count
fn next_color_id(used: &[u32]) -> u32 {
    for candidate in 1..=COLOR_ID_RANGE {
        if !used.contains(&candidate) {
            return candidate;
        }
    }
    (used.len() as u32 % COLOR_ID_RANGE) + 1
}
