//! `statuspage-sync plan`: show what the next cycle would change.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::domain::plan::{GroupChange, Operation};
use crate::domain::sync_service::PreparedCycle;
use crate::domain::types::TargetEntity;
use crate::error::SyncError;

use super::{GlobalOpts, OutputFormat};

#[derive(Serialize)]
struct PlanReport<'a> {
    operations: Vec<Operation>,
    skipped_deletes: &'a [TargetEntity],
    inconsistencies: &'a [SyncError],
}

pub fn run(global: &GlobalOpts, format: OutputFormat) -> Result<()> {
    let config = super::prepare(global)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let prepared = runtime.block_on(async {
        let mut sync = super::build_sync_service(&config)?;
        anyhow::Ok(sync.prepare().await?)
    })?;

    match format {
        OutputFormat::Json => {
            let report = PlanReport {
                operations: prepared.plan.operations(),
                skipped_deletes: &prepared.plan.skipped_deletes,
                inconsistencies: &prepared.plan.inconsistencies,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_table(&prepared),
    }
    Ok(())
}

fn print_table(prepared: &PreparedCycle) {
    let plan = &prepared.plan;
    println!(
        "{} service '{}': {} desired entities",
        "::".blue().bold(),
        prepared.tree.name,
        prepared.desired.len()
    );
    if prepared.current.is_empty() {
        println!("{} status page has no components yet", "::".blue().bold());
    } else {
        println!(
            "{} status page: {} components, {} groups",
            "::".blue().bold(),
            prepared.current.components.len(),
            prepared.current.groups.len()
        );
    }

    if plan.is_empty() {
        println!("{} status page is up to date", "ok".green().bold());
    }
    for op in plan.operations() {
        println!("  {}", render(&op));
    }

    for entity in &plan.skipped_deletes {
        println!(
            "  {} keep {} '{}' (dangling deletes disabled)",
            "=".yellow(),
            entity.kind,
            entity.name
        );
    }
    for warning in &plan.inconsistencies {
        println!("{} {}", "!!".red().bold(), warning);
    }
}

fn render(op: &Operation) -> String {
    match op {
        Operation::CreateGroup { .. } => format!("{} {}", "+".green(), op.describe()),
        Operation::CreateComponent { status, group, .. } => {
            let group = group
                .as_deref()
                .map(|g| format!(" in '{}'", g))
                .unwrap_or_default();
            format!("{} {} [{}]{}", "+".green(), op.describe(), status, group)
        }
        Operation::UpdateComponent(update) => {
            let mut changes = Vec::new();
            if let Some(status) = update.status {
                changes.push(format!("status -> {}", status));
            }
            match &update.group {
                Some(GroupChange::Attach(g)) => changes.push(format!("group -> '{}'", g)),
                Some(GroupChange::Detach) => changes.push("leave group".to_string()),
                None => {}
            }
            format!("{} {} ({})", "~".yellow(), op.describe(), changes.join(", "))
        }
        Operation::DeleteComponent { .. } | Operation::DeleteGroup { .. } => {
            format!("{} {}", "-".red(), op.describe())
        }
    }
}
