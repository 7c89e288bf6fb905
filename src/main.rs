mod api;
mod commands;
mod config;
mod domain;
mod error;
mod logging;
mod scheduler;
mod statuspage;
#[cfg(test)]
mod testing;
mod webhook;
mod zabbix;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{GlobalOpts, OutputFormat};

#[derive(Parser)]
#[command(
    name = "statuspage-sync",
    version,
    about = "Mirror a Zabbix service tree onto a Statuspage.io page"
)]
struct Cli {
    /// Path to config file (default: ~/.config/statuspage-sync/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync continuously until interrupted or the failure streak gives up
    Run {
        /// Log planned changes without touching the status page
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single sync cycle
    Sync {
        /// Log planned changes without touching the status page
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the changes the next cycle would apply
    Plan {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Check connectivity to Zabbix and Statuspage
    Check,

    /// Print the effective configuration with secrets redacted
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let global = GlobalOpts {
        config: cli.config,
        log_level: cli.log_level,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run { dry_run } => commands::run::run(&global, dry_run),
        Commands::Sync { dry_run, format } => commands::sync::run(&global, dry_run, format),
        Commands::Plan { format } => commands::plan::run(&global, format),
        Commands::Check => commands::check::run(&global),
        Commands::Config => commands::config::run(&global),
    }
}
