//! `statuspage-sync sync`: run exactly one cycle and report the outcome.

use anyhow::{bail, Result};
use colored::Colorize;

use crate::domain::reconciler::CycleResult;

use super::{GlobalOpts, OutputFormat};

pub fn run(global: &GlobalOpts, dry_run: bool, format: OutputFormat) -> Result<()> {
    let mut config = super::prepare(global)?;
    if dry_run {
        config.sync.dry_run = true;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        let mut sync = super::build_sync_service(&config)?;
        anyhow::Ok(sync.run_cycle().await)
    })?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => print_table(&result),
    }

    if !result.success {
        match &result.first_error {
            Some(err) => bail!("sync cycle failed: {}", err),
            None => bail!("sync cycle failed"),
        }
    }
    Ok(())
}

fn print_table(result: &CycleResult) {
    let marker = if result.success {
        "ok".green().bold()
    } else {
        "!!".red().bold()
    };
    let title = if result.dry_run {
        "sync cycle (dry run)"
    } else {
        "sync cycle"
    };
    println!("{} {} ({} changes applied)", marker, title.bold(), result.applied());
    println!("  created:         {}", result.created);
    println!("  updated:         {}", result.updated);
    println!("  deleted:         {}", result.deleted);
    if result.skipped_deletes > 0 {
        println!(
            "  skipped deletes: {}",
            result.skipped_deletes.to_string().yellow()
        );
    }
    if result.failed > 0 {
        println!("  failed:          {}", result.failed.to_string().red());
    }
    if let Some(err) = &result.first_error {
        println!("  first error:     {}", err.to_string().red());
    }
    println!("  finished at:     {}", result.finished_at.to_rfc3339());
}
