//! The `practica validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let bank = practica_core::parser::load_bank(&bank_path)?;

    println!(
        "Bank: {} laws, {} positions, {} questions, {} exams",
        bank.laws.len(),
        bank.positions.len(),
        bank.questions.len(),
        bank.exams.len()
    );
    for position in &bank.positions {
        println!(
            "  Position {} ({} topics)",
            position.id,
            position.topics().count()
        );
    }

    let warnings = practica_core::parser::validate_bank(&bank);
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.subject, w.message);
    }

    if warnings.is_empty() {
        println!("Bank valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
