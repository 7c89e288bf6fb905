use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::api::rest::{self, AppState};
use crate::config::Config;
use crate::scheduler::{shutdown_signal, Scheduler};

use super::GlobalOpts;

pub fn run(global: &GlobalOpts, dry_run: bool) -> Result<()> {
    let mut config = super::prepare(global)?;
    // CLI flag overrides config value
    if dry_run {
        config.sync.dry_run = true;
    }

    // Build tokio runtime explicitly (no #[tokio::main] on fn main)
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_async(config))
}

async fn run_async(config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        page = %config.statuspage.page_id,
        root = %config.zabbix.root_service_id,
        "statuspage-sync starting"
    );

    let sync = super::build_sync_service(&config)?;
    let supervisor = super::build_supervisor(&config)?;
    let scheduler = Scheduler::new(
        sync,
        supervisor,
        Duration::from_millis(config.sync.update_delay_ms),
    );

    if !config.status.http_addr.is_empty() {
        let state = AppState {
            status: scheduler.status(),
        };
        let addr = config.status.http_addr.clone();
        tokio::spawn(async move {
            if let Err(e) = rest::serve(&addr, state).await {
                error!(error = %e, "status endpoint failed");
            }
        });
    }

    let outcome = scheduler.run_until(shutdown_signal()).await;
    if let Err(e) = &outcome {
        error!(error = %e, "statuspage-sync exiting");
    } else {
        info!("statuspage-sync stopped");
    }
    outcome
}
