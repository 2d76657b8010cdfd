//! The `practica import` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use practica_core::config::load_config_from;
use practica_core::parser::{load_bank, validate_bank};
use practica_store::SqliteStore;

pub fn execute(
    bank_path: PathBuf,
    database: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let database = database.unwrap_or(config.database);

    let bank = load_bank(&bank_path)?;
    if bank.is_empty() {
        anyhow::bail!("no bank content found in {}", bank_path.display());
    }
    let warnings = validate_bank(&bank);
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.subject, w.message);
    }

    let store = SqliteStore::open(&database)
        .with_context(|| format!("failed to open database: {}", database.display()))?;
    let summary = store
        .import_bank(&bank)
        .with_context(|| format!("failed to import {}", bank_path.display()))?;

    println!(
        "Imported {} laws ({} articles), {} positions ({} topics), {} questions, {} exams into {}",
        summary.laws,
        summary.articles,
        summary.positions,
        summary.topics,
        summary.questions,
        summary.exams,
        database.display()
    );
    if !warnings.is_empty() {
        println!("{} warning(s) found.", warnings.len());
    }

    Ok(())
}
