use anyhow::{bail, Result};
use colored::Colorize;

use crate::config::Config;
use crate::domain::ports::{MonitoringSource, StatusTarget};
use crate::statuspage::StatuspageClient;
use crate::zabbix::ZabbixClient;

use super::GlobalOpts;

pub fn run(global: &GlobalOpts) -> Result<()> {
    let config = super::prepare(global)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let problems = runtime.block_on(check(&config))?;

    if problems > 0 {
        bail!("{} check(s) failed", problems);
    }
    println!("{} ready to sync", "ok".green().bold());
    Ok(())
}

/// Returns the number of failed checks.
async fn check(config: &Config) -> Result<usize> {
    println!("{}", "statuspage-sync check".bold());
    let mut problems = 0;

    println!("{} Zabbix {}", "::".blue().bold(), config.zabbix.api_host);
    let zabbix = ZabbixClient::new(&config.zabbix)?;
    match zabbix.authenticate().await {
        Ok(session) => {
            println!("  {} authenticated as {}", "ok".green().bold(), config.zabbix.username);
            match zabbix
                .fetch_service_tree(&session, &config.zabbix.root_service_id)
                .await
            {
                Ok(tree) => println!(
                    "  {} service '{}' has {} descendants",
                    "ok".green().bold(),
                    tree.name,
                    tree.descendant_count()
                ),
                Err(e) => {
                    problems += 1;
                    println!("  {} {}", "!!".red().bold(), e);
                }
            }
        }
        Err(e) => {
            problems += 1;
            println!("  {} {}", "!!".red().bold(), e);
        }
    }

    println!(
        "{} Statuspage {} (page {})",
        "::".blue().bold(),
        config.statuspage.api_host,
        config.statuspage.page_id
    );
    let statuspage = StatuspageClient::new(&config.statuspage)?;
    match statuspage.list_entities().await {
        Ok(snapshot) => println!(
            "  {} {} components, {} groups",
            "ok".green().bold(),
            snapshot.components.len(),
            snapshot.groups.len()
        ),
        Err(e) => {
            problems += 1;
            println!("  {} {}", "!!".red().bold(), e);
        }
    }

    if config.alert.webhook_url.trim().is_empty() {
        println!("{} alerting disabled (no webhook configured)", ">>".blue().bold());
    } else {
        println!(
            "{} alerting after {} failures, {}",
            ">>".blue().bold(),
            config.alert.fail_attempts,
            match config.alert.bail_attempts {
                0 => "never giving up".to_string(),
                n => format!("giving up after {}", n),
            }
        );
    }

    Ok(problems)
}
