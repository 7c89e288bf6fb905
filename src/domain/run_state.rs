//! Failure counting across cycles, alert escalation and bail-out.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::ports::AlertSink;
use super::reconciler::CycleResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degrading,
    Alerting,
    Fatal,
}

/// `0` disables the corresponding escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    pub alert_after: u32,
    pub bail_after: u32,
}

/// What a recorded cycle outcome changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StillHealthy,
    Recovered { failures: u32, alerted: bool },
    Failed { failures: u32, raise_alert: bool, fatal: bool },
}

/// Process-wide failure bookkeeping. Owned by the scheduler and only
/// mutated between cycles.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    consecutive_failures: u32,
    alert_sent: bool,
    thresholds: Thresholds,
}

impl RunState {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            consecutive_failures: 0,
            alert_sent: false,
            thresholds,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn alert_sent(&self) -> bool {
        self.alert_sent
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn state(&self) -> HealthState {
        let n = self.consecutive_failures;
        let Thresholds {
            alert_after,
            bail_after,
        } = self.thresholds;
        if bail_after > 0 && n >= bail_after {
            HealthState::Fatal
        } else if alert_after > 0 && n >= alert_after {
            HealthState::Alerting
        } else if n > 0 {
            HealthState::Degrading
        } else {
            HealthState::Healthy
        }
    }

    pub fn record_success(&mut self) -> Transition {
        let failures = std::mem::take(&mut self.consecutive_failures);
        let alerted = std::mem::take(&mut self.alert_sent);
        if failures == 0 {
            Transition::StillHealthy
        } else {
            Transition::Recovered { failures, alerted }
        }
    }

    pub fn record_failure(&mut self) -> Transition {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;
        let alert_after = self.thresholds.alert_after;

        let raise_alert = alert_after > 0 && failures >= alert_after && !self.alert_sent;
        if raise_alert {
            self.alert_sent = true;
        }

        Transition::Failed {
            failures,
            raise_alert,
            fatal: self.state() == HealthState::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Bail,
}

/// Wraps cycle outcomes with the run state and posts alerts when it escalates.
pub struct Supervisor {
    state: RunState,
    alerts: Option<Arc<dyn AlertSink>>,
    page_id: String,
    include_detail: bool,
    origin: String,
}

impl Supervisor {
    pub fn new(
        thresholds: Thresholds,
        alerts: Option<Arc<dyn AlertSink>>,
        page_id: impl Into<String>,
        include_detail: bool,
    ) -> Self {
        let origin = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown host".to_string());
        Self {
            state: RunState::new(thresholds),
            alerts,
            page_id: page_id.into(),
            include_detail,
            origin,
        }
    }

    pub fn run_state(&self) -> &RunState {
        &self.state
    }

    pub async fn observe(&mut self, result: &CycleResult) -> Verdict {
        if result.success {
            match self.state.record_success() {
                Transition::Recovered { failures, alerted } => {
                    info!(previous_failures = failures, "sync recovered");
                    if alerted {
                        self.notify(format!(
                            "Zabbix <-> Statuspage sync restored for page {} after {} failed attempts (host {}).",
                            self.page_id, failures, self.origin
                        ))
                        .await;
                    }
                }
                Transition::StillHealthy | Transition::Failed { .. } => {}
            }
            return Verdict::Continue;
        }

        let Transition::Failed {
            failures,
            raise_alert,
            fatal,
        } = self.state.record_failure()
        else {
            return Verdict::Continue;
        };

        let detail = result
            .first_error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        error!(
            consecutive_failures = failures,
            state = ?self.state.state(),
            alert_sent = self.state.alert_sent(),
            error = %detail,
            "sync cycle failed"
        );

        if fatal {
            error!(
                consecutive_failures = failures,
                bail_after = self.state.thresholds.bail_after,
                "consecutive failures reached the bail threshold, giving up"
            );
            let text = format!(
                "Zabbix <-> Statuspage sync for page {} is giving up after {} consecutive failed attempts (host {}).",
                self.page_id, failures, self.origin
            );
            self.notify(self.with_detail(text, &detail)).await;
            return Verdict::Bail;
        }

        if raise_alert {
            let text = format!(
                "Zabbix <-> Statuspage sync failure. The status page {} may be out of date! \
                 Consecutive failed sync attempts: {} (host {}).",
                self.page_id, failures, self.origin
            );
            self.notify(self.with_detail(text, &detail)).await;
        }

        Verdict::Continue
    }

    fn with_detail(&self, text: String, detail: &str) -> String {
        if self.include_detail {
            format!("{} Error: {}", text, detail)
        } else {
            text
        }
    }

    async fn notify(&self, message: String) {
        let Some(alerts) = &self.alerts else {
            return;
        };
        match alerts.post(&message).await {
            Ok(()) => info!("alert delivered"),
            Err(e) => warn!(error = %e, "alert delivery failed"),
        }
    }
}
