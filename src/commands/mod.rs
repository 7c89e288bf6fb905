pub mod check;
pub mod config;
pub mod plan;
pub mod run;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::ValueEnum;

use crate::config::Config;
use crate::domain::ports::AlertSink;
use crate::domain::run_state::Supervisor;
use crate::domain::sync_service::SyncService;
use crate::statuspage::StatuspageClient;
use crate::webhook::WebhookClient;
use crate::zabbix::ZabbixClient;

/// Options shared by every subcommand.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub log_level: Option<String>,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Load and validate the configuration, apply CLI overrides and install logging.
pub(crate) fn prepare(global: &GlobalOpts) -> Result<Config> {
    let mut config = crate::config::load(global.config.as_deref())?;
    if let Some(level) = &global.log_level {
        config.log.level = level.clone();
    }
    if global.verbose {
        config.log.level = "debug".to_string();
    }
    crate::logging::init(&config.log)?;
    Ok(config)
}

pub(crate) fn build_sync_service(config: &Config) -> Result<SyncService> {
    let source = Arc::new(ZabbixClient::new(&config.zabbix)?);
    let target = Arc::new(StatuspageClient::new(&config.statuspage)?);
    Ok(SyncService::new(source, target, config.sync_options()))
}

/// Alerting is off when no webhook is configured.
pub(crate) fn build_supervisor(config: &Config) -> Result<Supervisor> {
    let alerts: Option<Arc<dyn AlertSink>> = if config.alert.webhook_url.trim().is_empty() {
        None
    } else {
        let webhook: Arc<dyn AlertSink> = Arc::new(WebhookClient::new(
            &config.alert.webhook_url,
            config.alert.timeout_secs,
        )?);
        Some(webhook)
    };
    Ok(Supervisor::new(
        config.thresholds(),
        alerts,
        config.statuspage.page_id.clone(),
        config.alert.include_exception,
    ))
}
