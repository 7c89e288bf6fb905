//! Scheduler loop: run a cycle, feed the outcome to the supervisor, sleep, repeat.
//!
//! The delay is measured from the end of one cycle to the start of the next,
//! so cycles never overlap. The loop ends when the supervisor bails or the
//! shutdown future resolves while waiting for the next cycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::reconciler::CycleResult;
use crate::domain::run_state::{HealthState, RunState, Supervisor, Thresholds, Verdict};
use crate::domain::sync_service::SyncService;

/// Read-only view published after every cycle for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: HealthState,
    pub run_state: RunState,
    pub cycles: u64,
    pub last_cycle: Option<CycleResult>,
}

impl StatusSnapshot {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            state: HealthState::Healthy,
            run_state: RunState::new(thresholds),
            cycles: 0,
            last_cycle: None,
        }
    }
}

pub type SharedStatus = Arc<RwLock<StatusSnapshot>>;

pub struct Scheduler {
    sync: SyncService,
    supervisor: Supervisor,
    delay: Duration,
    status: SharedStatus,
}

impl Scheduler {
    pub fn new(sync: SyncService, supervisor: Supervisor, delay: Duration) -> Self {
        let status = Arc::new(RwLock::new(StatusSnapshot::new(
            supervisor.run_state().thresholds(),
        )));
        Self {
            sync,
            supervisor,
            delay,
            status,
        }
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    /// Run until `shutdown` resolves (returns `Ok`) or the failure streak
    /// reaches the bail threshold (returns an error).
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            delay_ms = self.delay.as_millis() as u64,
            dry_run = self.sync.options().dry_run,
            "scheduler started"
        );

        loop {
            let result = self.sync.run_cycle().await;
            let verdict = self.supervisor.observe(&result).await;
            self.publish(result).await;

            if verdict == Verdict::Bail {
                bail!(
                    "giving up after {} consecutive failed sync cycles",
                    self.supervisor.run_state().consecutive_failures()
                );
            }

            debug!(delay_ms = self.delay.as_millis() as u64, "waiting for next cycle");
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = &mut shutdown => {
                    info!("scheduler stopped");
                    return Ok(());
                }
            }
        }
    }

    async fn publish(&self, result: CycleResult) {
        let run_state = self.supervisor.run_state().clone();
        let mut status = self.status.write().await;
        status.state = run_state.state();
        status.run_state = run_state;
        status.cycles += 1;
        status.last_cycle = Some(result);
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("Received Ctrl+C, shutting down"); },
        _ = terminate => { info!("Received SIGTERM, shutting down"); },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::domain::sync_service::SyncOptions;
    use crate::domain::types::{SourceNode, SourceStatus};
    use crate::error::SyncError;
    use crate::testing::{FakeAlerts, FakeSource, FakeTarget};

    fn tree() -> SourceNode {
        SourceNode::group(
            "1",
            "root",
            SourceStatus::Ok,
            vec![SourceNode::leaf("2", "API", SourceStatus::Ok)],
        )
    }

    fn scheduler(
        source: &Arc<FakeSource>,
        alerts: &Arc<FakeAlerts>,
        thresholds: Thresholds,
    ) -> Scheduler {
        scheduler_with_delay(source, alerts, thresholds, Duration::from_millis(5))
    }

    fn scheduler_with_delay(
        source: &Arc<FakeSource>,
        alerts: &Arc<FakeAlerts>,
        thresholds: Thresholds,
        delay: Duration,
    ) -> Scheduler {
        let sync = SyncService::new(
            source.clone(),
            Arc::new(FakeTarget::new()),
            SyncOptions {
                root_service_id: "1".into(),
                allow_dangling_delete: false,
                dry_run: false,
            },
        );
        let supervisor = Supervisor::new(thresholds, Some(alerts.clone()), "page1", false);
        Scheduler::new(sync, supervisor, delay)
    }

    #[tokio::test]
    async fn bails_after_threshold_and_alerts() {
        let source = Arc::new(FakeSource::new(tree()));
        source.fail_with(SyncError::SourceUnavailable("down".into()));
        let alerts = Arc::new(FakeAlerts::new());
        let scheduler = scheduler(
            &source,
            &alerts,
            Thresholds {
                alert_after: 1,
                bail_after: 3,
            },
        );
        let status = scheduler.status();

        let err = scheduler
            .run_until(std::future::pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("3 consecutive"));
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 3);

        let messages = alerts.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("giving up"));

        let status = status.read().await;
        assert_eq!(status.cycles, 3);
        assert_eq!(status.state, HealthState::Fatal);
        assert!(!status.last_cycle.as_ref().unwrap().success);
    }

    #[tokio::test]
    async fn shutdown_stops_a_healthy_loop() {
        let source = Arc::new(FakeSource::new(tree()));
        let alerts = Arc::new(FakeAlerts::new());
        let scheduler = scheduler(
            &source,
            &alerts,
            Thresholds {
                alert_after: 3,
                bail_after: 0,
            },
        );
        let status = scheduler.status();

        let shutdown = tokio::time::sleep(Duration::from_millis(60));
        scheduler.run_until(shutdown).await.unwrap();

        let status = status.read().await;
        assert!(status.cycles >= 2);
        assert_eq!(status.state, HealthState::Healthy);
        assert!(status.last_cycle.as_ref().unwrap().success);
        assert!(alerts.messages().is_empty());
    }

    #[tokio::test]
    async fn delay_runs_from_end_of_cycle_to_next_start() {
        let cycle = Duration::from_millis(60);
        let delay = Duration::from_millis(40);
        let source = Arc::new(FakeSource::new(tree()));
        source.set_latency(cycle);
        let alerts = Arc::new(FakeAlerts::new());
        let scheduler = scheduler_with_delay(
            &source,
            &alerts,
            Thresholds {
                alert_after: 3,
                bail_after: 0,
            },
            delay,
        );

        let shutdown = tokio::time::sleep(Duration::from_millis(350));
        scheduler.run_until(shutdown).await.unwrap();

        let starts = source.fetch_started();
        // Each start waits for the previous cycle plus the delay: at most 4 in 350ms.
        assert!((2..=4).contains(&starts.len()), "cycles: {}", starts.len());
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= cycle + delay);
        }
    }
}
