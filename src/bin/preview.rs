use miette::IntoDiagnostic;
use planicare::config::{Config, DEFAULT_GAP_THRESHOLD_MINUTES};
use planicare::diff::diff;
use planicare::document::DocumentText;
use planicare::error::Error;
use planicare::gaps::find_gaps;
use planicare::model::Snapshot;
use planicare::parser::parse_document;
use planicare::settings::EntitySettings;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the settings table from the file named by SETTINGS_FILE, if any
fn load_settings() -> miette::Result<HashMap<String, EntitySettings>> {
    let Ok(path) = env::var("SETTINGS_FILE") else {
        return Ok(HashMap::new());
    };
    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path, e)))?;
    let settings = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid settings file {}: {}", path, e)))?;
    Ok(settings)
}

fn main() -> miette::Result<()> {
    init_logging()?;

    let mut args = env::args().skip(1);
    let Some(input) = args.next() else {
        eprintln!("Usage: preview <schedule.pdf|schedule.txt> [previous-snapshot.json]");
        std::process::exit(2);
    };
    let previous_snapshot = args.next();

    let corrections = Config::load_corrections("config/name_corrections.toml");
    let settings = load_settings()?;

    info!("Previewing {}", input);
    let bytes = fs::read(&input).into_diagnostic()?;
    let doc = if Path::new(&input)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    {
        DocumentText::from_pdf_bytes(&bytes)?
    } else {
        DocumentText::from_text(&String::from_utf8_lossy(&bytes))
    };

    let outcome = parse_document(&doc, &settings, &corrections)?;
    let gaps = find_gaps(&outcome.entries, DEFAULT_GAP_THRESHOLD_MINUTES);

    let mut output = serde_json::json!({
        "entries": outcome.entries,
        "unknown_beneficiaries": outcome.unknown_beneficiaries,
        "warnings": outcome.warnings,
        "gap_warnings": gaps,
    });

    if let Some(path) = previous_snapshot {
        let content = fs::read_to_string(&path).into_diagnostic()?;
        let previous: Snapshot = serde_json::from_str(&content)
            .map_err(|e| Error::Serialization(format!("Invalid snapshot {}: {}", path, e)))?;
        let current = Snapshot::from_entries(
            outcome.entries.clone(),
            previous.month,
            previous.year,
        );
        output["diff"] = serde_json::to_value(diff(&previous, &current))
            .map_err(Error::from)?;
    }

    println!("{}", serde_json::to_string_pretty(&output).map_err(Error::from)?);
    Ok(())
}
