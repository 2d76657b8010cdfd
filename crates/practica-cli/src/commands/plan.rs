//! The `practica plan` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use practica_core::planner::{AllocationPlan, PlanRequest, Restriction, ShortfallPolicy};

use super::Source;

pub async fn execute(
    source: Source,
    position: String,
    count: usize,
    topics: Vec<String>,
    blocks: Vec<String>,
    format: String,
) -> Result<()> {
    let manager = source.open()?;
    let restriction = Restriction { topics, blocks };
    let request = PlanRequest {
        position_id: position,
        total: count,
        restriction: (!restriction.is_empty()).then_some(restriction),
        // A dry run always reports the achievable plan.
        policy: ShortfallPolicy::BestEffort,
    };
    let plan = manager.plan(&request).await?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&plan)?),
        _ => print_plan(&plan),
    }

    if !plan.is_complete() {
        std::process::exit(2);
    }

    Ok(())
}

fn print_plan(plan: &AllocationPlan) {
    let mut table = Table::new();
    table.set_header(vec!["Block", "Topic", "Weight", "Quota", "Eligible"]);

    for quota in &plan.quotas {
        table.add_row(vec![
            Cell::new(&quota.block_id),
            Cell::new(&quota.topic_id),
            Cell::new(format!("{:.3}", quota.weight)),
            Cell::new(quota.quota),
            Cell::new(
                quota
                    .available
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
        ]);
    }

    println!("Position: {}", plan.position_id);
    println!("{table}");
    println!("Planned {} of {} questions.", plan.total(), plan.requested);
    if let Some(pool) = plan.pool {
        println!("Distinct eligible questions: {pool}");
    }

    if !plan.shortfalls.is_empty() {
        println!("\nShortfalls:");
        for s in &plan.shortfalls {
            println!(
                "  {}: wanted {}, {} eligible (short {})",
                s.topic_id, s.requested, s.available, s.shortfall
            );
        }
    }
}
