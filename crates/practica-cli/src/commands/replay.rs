//! The `practica replay` command.

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde::Serialize;

use practica_core::replica::{FrozenPlan, IntegrityReport};

use super::Source;

#[derive(Serialize)]
struct ReplayOutput<'a> {
    plan: &'a FrozenPlan,
    report: &'a IntegrityReport,
    intact: bool,
}

pub async fn execute(
    source: Source,
    exam_id: String,
    part: Option<String>,
    format: String,
) -> Result<()> {
    let manager = source.open()?;
    let (plan, report) = manager.verify_replica(&exam_id, part.as_deref()).await?;

    match format.as_str() {
        "json" => {
            let output = ReplayOutput {
                plan: &plan,
                report: &report,
                intact: report.is_intact(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => print_report(&plan, &report),
    }

    if !report.is_intact() {
        std::process::exit(2);
    }

    Ok(())
}

fn status(report: &IntegrityReport, question_id: &str) -> &'static str {
    let listed = |ids: &[String]| ids.iter().any(|id| id == question_id);
    if listed(&report.missing) {
        "MISSING"
    } else if listed(&report.inactive) {
        "INACTIVE"
    } else if listed(&report.unapproved) {
        "unapproved"
    } else {
        "ok"
    }
}

fn print_report(plan: &FrozenPlan, report: &IntegrityReport) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Part", "Question", "Status"]);
    for entry in &plan.entries {
        table.add_row(vec![
            Cell::new(entry.ordinal),
            Cell::new(&entry.part),
            Cell::new(&entry.question_id),
            Cell::new(status(report, &entry.question_id)),
        ]);
    }

    println!("Exam: {} ({} questions)", plan.exam, report.total);
    println!("{table}");

    if report.is_intact() {
        println!("Replica intact.");
    } else {
        println!(
            "\nReplica broken: {} missing, {} inactive.",
            report.missing.len(),
            report.inactive.len()
        );
    }
    if !report.unapproved.is_empty() {
        println!(
            "{} question(s) are not approved by content review.",
            report.unapproved.len()
        );
    }
}
