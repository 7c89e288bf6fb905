//! Reconciler: applies a `DiffPlan` to the status page.
//!
//! Operations run strictly in plan order. A failing operation is recorded and
//! the rest of the batch still runs, so one bad entity cannot keep the rest of
//! the page from converging.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, SyncError};

use super::plan::{DiffPlan, GroupChange, Operation};
use super::ports::{ComponentPatch, StatusTarget};
use super::types::{EntityKind, TargetSnapshot};

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    pub success: bool,
    pub dry_run: bool,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped_deletes: usize,
    pub failed: usize,
    pub first_error: Option<SyncError>,
    pub finished_at: DateTime<Utc>,
}

impl CycleResult {
    pub fn new(dry_run: bool) -> Self {
        Self {
            success: true,
            dry_run,
            created: 0,
            updated: 0,
            deleted: 0,
            skipped_deletes: 0,
            failed: 0,
            first_error: None,
            finished_at: Utc::now(),
        }
    }

    /// A cycle that stopped before anything was applied.
    pub fn aborted(err: SyncError, dry_run: bool) -> Self {
        Self {
            success: false,
            first_error: Some(err),
            ..Self::new(dry_run)
        }
    }

    pub fn applied(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    fn record(&mut self, op: &Operation) {
        match op {
            Operation::CreateGroup { .. } | Operation::CreateComponent { .. } => self.created += 1,
            Operation::UpdateComponent(_) => self.updated += 1,
            Operation::DeleteComponent { .. } | Operation::DeleteGroup { .. } => self.deleted += 1,
        }
    }

    fn record_failure(&mut self, err: SyncError) {
        self.success = false;
        self.failed += 1;
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}

pub struct Reconciler<'a> {
    target: &'a dyn StatusTarget,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(target: &'a dyn StatusTarget, dry_run: bool) -> Self {
        Self { target, dry_run }
    }

    /// Apply every operation of `plan`. `current` is the snapshot the plan was
    /// computed from; its groups seed the name → id index that new groups extend.
    pub async fn apply(&self, plan: &DiffPlan, current: &TargetSnapshot) -> CycleResult {
        let mut result = CycleResult::new(self.dry_run);
        result.skipped_deletes = plan.skipped_deletes.len();

        let mut group_ids: HashMap<String, String> = HashMap::with_capacity(current.groups.len());
        for group in &current.groups {
            group_ids
                .entry(group.name.clone())
                .or_insert_with(|| group.id.clone());
        }

        for op in plan.operations() {
            match self.apply_one(&op, &mut group_ids).await {
                Ok(()) => result.record(&op),
                Err(err) => {
                    let err = match err {
                        err @ SyncError::ApplyFailed { .. } => err,
                        other => SyncError::apply_failed(op.describe(), other),
                    };
                    warn!(error = %err, "operation failed, continuing with the rest of the plan");
                    result.record_failure(err);
                }
            }
        }

        result.finished_at = Utc::now();
        result
    }

    async fn apply_one(
        &self,
        op: &Operation,
        group_ids: &mut HashMap<String, String>,
    ) -> Result<()> {
        match op {
            Operation::CreateGroup { name } => {
                let id = if self.dry_run {
                    info!(name = %name, dry_run = true, "would create component group");
                    format!("dry-run:{}", name)
                } else {
                    let id = self.target.create_group(name).await?;
                    info!(name = %name, id = %id, "created component group");
                    id
                };
                group_ids.insert(name.clone(), id);
            }
            Operation::CreateComponent {
                name,
                status,
                group,
            } => {
                let group_id = group
                    .as_deref()
                    .map(|g| resolve_group(group_ids, g, op))
                    .transpose()?;
                if self.dry_run {
                    info!(name = %name, status = %status, group = ?group_id, dry_run = true, "would create component");
                } else {
                    let id = self
                        .target
                        .create_component(name, *status, group_id.as_deref())
                        .await?;
                    info!(name = %name, id = %id, status = %status, group = ?group_id, "created component");
                }
            }
            Operation::UpdateComponent(update) => {
                // An unresolvable group only blocks the move; the status still goes out.
                let (group_id, group_error) = match &update.group {
                    None => (None, None),
                    Some(GroupChange::Detach) => (Some(None), None),
                    Some(GroupChange::Attach(g)) => match resolve_group(group_ids, g, op) {
                        Ok(id) => (Some(Some(id)), None),
                        Err(err) => (None, Some(err)),
                    },
                };
                let patch = ComponentPatch {
                    status: update.status,
                    group_id,
                };
                if patch != ComponentPatch::default() {
                    if self.dry_run {
                        info!(name = %update.name, id = %update.id, patch = ?patch, dry_run = true, "would update component");
                    } else {
                        self.target.update_component(&update.id, &patch).await?;
                        info!(name = %update.name, id = %update.id, patch = ?patch, "updated component");
                    }
                }
                if let Some(err) = group_error {
                    return Err(err);
                }
            }
            Operation::DeleteComponent { id, name } => {
                self.delete(id, name, EntityKind::Component).await?;
            }
            Operation::DeleteGroup { id, name } => {
                self.delete(id, name, EntityKind::ComponentGroup).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str, name: &str, kind: EntityKind) -> Result<()> {
        if self.dry_run {
            info!(name = %name, id = %id, kind = %kind, dry_run = true, "would delete");
            return Ok(());
        }
        self.target.delete_entity(id, kind).await?;
        info!(name = %name, id = %id, kind = %kind, "deleted");
        Ok(())
    }
}

fn resolve_group(group_ids: &HashMap<String, String>, name: &str, op: &Operation) -> Result<String> {
    group_ids.get(name).cloned().ok_or_else(|| {
        SyncError::apply_failed(
            op.describe(),
            format!("component group '{}' is not available on the status page", name),
        )
    })
}
