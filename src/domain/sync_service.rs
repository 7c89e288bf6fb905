//! Sync service: one cycle of the pipeline:
//!   Fetch tree → Flatten → Fetch target → Diff → Apply
//!
//! Any failure before the apply step aborts the cycle. The monitoring source
//! session is kept across cycles and re-established once when it expires.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

use super::flatten::flatten;
use super::plan::{self, DiffPlan};
use super::ports::{MonitoringSource, Session, StatusTarget};
use super::reconciler::{CycleResult, Reconciler};
use super::types::{DesiredEntity, SourceNode, TargetSnapshot};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub root_service_id: String,
    pub allow_dangling_delete: bool,
    pub dry_run: bool,
}

/// Everything computed for a cycle before anything is applied.
#[derive(Debug, Clone)]
pub struct PreparedCycle {
    pub tree: SourceNode,
    pub desired: Vec<DesiredEntity>,
    pub current: TargetSnapshot,
    pub plan: DiffPlan,
}

pub struct SyncService {
    source: Arc<dyn MonitoringSource>,
    target: Arc<dyn StatusTarget>,
    options: SyncOptions,
    session: Option<Session>,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn MonitoringSource>,
        target: Arc<dyn StatusTarget>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            target,
            options,
            session: None,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Fetch both sides and compute the plan without applying it.
    pub async fn prepare(&mut self) -> Result<PreparedCycle> {
        let tree = self.fetch_tree().await?;
        let desired = flatten(&tree)?;
        debug!(entities = desired.len(), "flattened service tree");

        let current = self.target.list_entities().await?;
        debug!(
            components = current.components.len(),
            groups = current.groups.len(),
            "fetched status page state"
        );

        let plan = plan::compute(&desired, &current, self.options.allow_dangling_delete);
        Ok(PreparedCycle {
            tree,
            desired,
            current,
            plan,
        })
    }

    /// Run one full cycle. Never fails; the outcome is in the `CycleResult`.
    pub async fn run_cycle(&mut self) -> CycleResult {
        let prepared = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(error = %err, kind = err.kind(), "sync cycle aborted");
                return CycleResult::aborted(err, self.options.dry_run);
            }
        };

        let result = Reconciler::new(self.target.as_ref(), self.options.dry_run)
            .apply(&prepared.plan, &prepared.current)
            .await;

        info!(
            success = result.success,
            dry_run = result.dry_run,
            created = result.created,
            updated = result.updated,
            deleted = result.deleted,
            skipped_deletes = result.skipped_deletes,
            failed = result.failed,
            inconsistencies = prepared.plan.inconsistencies.len(),
            "sync cycle completed"
        );
        result
    }

    async fn session(&mut self) -> Result<Session> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        debug!("authenticating to monitoring source");
        let session = self.source.authenticate().await?;
        info!("authenticated to monitoring source");
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn fetch_tree(&mut self) -> Result<SourceNode> {
        let session = self.session().await?;
        match self
            .source
            .fetch_service_tree(&session, &self.options.root_service_id)
            .await
        {
            Err(SyncError::Auth(reason)) => {
                info!(reason = %reason, "session rejected, re-authenticating");
                self.session = None;
                let session = self.session().await?;
                let result = self
                    .source
                    .fetch_service_tree(&session, &self.options.root_service_id)
                    .await;
                if matches!(result, Err(SyncError::Auth(_))) {
                    self.session = None;
                }
                result
            }
            other => other,
        }
    }
}
