//! Diff between desired and current status page state.
//!
//! Entities are matched by name within their kind. The plan is computed once
//! per cycle and discarded after it is applied.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SyncError;

use super::types::{ComponentStatus, DesiredEntity, EntityKind, TargetEntity, TargetSnapshot};

/// Group membership change of an existing component. Groups are referenced by
/// name because the group may only be created during the same apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "group", rename_all = "snake_case")]
pub enum GroupChange {
    Detach,
    Attach(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Update {
    pub id: String,
    pub name: String,
    pub status: Option<ComponentStatus>,
    pub group: Option<GroupChange>,
}

/// One unit of work against the status page, in apply order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateGroup {
        name: String,
    },
    CreateComponent {
        name: String,
        status: ComponentStatus,
        group: Option<String>,
    },
    UpdateComponent(Update),
    DeleteComponent {
        id: String,
        name: String,
    },
    DeleteGroup {
        id: String,
        name: String,
    },
}

impl Operation {
    pub fn describe(&self) -> String {
        match self {
            Self::CreateGroup { name } => format!("create component group '{}'", name),
            Self::CreateComponent { name, .. } => format!("create component '{}'", name),
            Self::UpdateComponent(update) => format!("update component '{}'", update.name),
            Self::DeleteComponent { name, .. } => format!("delete component '{}'", name),
            Self::DeleteGroup { name, .. } => format!("delete component group '{}'", name),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffPlan {
    /// Desired entities missing from the target, in flatten order.
    pub creates: Vec<DesiredEntity>,
    pub updates: Vec<Update>,
    /// Dangling target entities that will be removed.
    pub deletes: Vec<TargetEntity>,
    /// Dangling target entities left alone because deletion is not allowed.
    pub skipped_deletes: Vec<TargetEntity>,
    pub inconsistencies: Vec<SyncError>,
}

impl DiffPlan {
    /// Operations in dependency order: create groups, create components,
    /// updates, delete components, delete groups.
    pub fn operations(&self) -> Vec<Operation> {
        let mut ops = Vec::with_capacity(self.len());

        ops.extend(
            self.creates
                .iter()
                .filter(|e| e.kind == EntityKind::ComponentGroup)
                .map(|e| Operation::CreateGroup {
                    name: e.name.clone(),
                }),
        );
        ops.extend(
            self.creates
                .iter()
                .filter(|e| e.kind == EntityKind::Component)
                .map(|e| Operation::CreateComponent {
                    name: e.name.clone(),
                    status: e.status,
                    group: e.parent_group.clone(),
                }),
        );
        ops.extend(self.updates.iter().cloned().map(Operation::UpdateComponent));
        ops.extend(
            self.deletes
                .iter()
                .filter(|e| e.kind == EntityKind::Component)
                .map(|e| Operation::DeleteComponent {
                    id: e.id.clone(),
                    name: e.name.clone(),
                }),
        );
        ops.extend(
            self.deletes
                .iter()
                .filter(|e| e.kind == EntityKind::ComponentGroup)
                .map(|e| Operation::DeleteGroup {
                    id: e.id.clone(),
                    name: e.name.clone(),
                }),
        );

        ops
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute the plan that converges `current` onto `desired`.
pub fn compute(desired: &[DesiredEntity], current: &TargetSnapshot, allow_delete: bool) -> DiffPlan {
    let mut plan = DiffPlan::default();

    let components = index_by_name(&current.components, &mut plan.inconsistencies);
    let groups = index_by_name(&current.groups, &mut plan.inconsistencies);

    let mut wanted: HashSet<(EntityKind, &str)> = HashSet::with_capacity(desired.len());

    for entity in desired {
        wanted.insert((entity.kind, entity.name.as_str()));

        let existing = match entity.kind {
            EntityKind::Component => components.get(entity.name.as_str()),
            EntityKind::ComponentGroup => groups.get(entity.name.as_str()),
        };

        let Some(existing) = existing else {
            debug!(name = %entity.name, kind = %entity.kind, "missing on status page");
            plan.creates.push(entity.clone());
            continue;
        };

        debug!(name = %entity.name, id = %existing.id, kind = %entity.kind, "matched");

        // Group status is derived by the status page from its members.
        if entity.kind == EntityKind::ComponentGroup {
            continue;
        }

        let status = (existing.status != entity.status).then_some(entity.status);
        let group = group_change(entity, existing, &groups);
        if status.is_some() || group.is_some() {
            debug!(
                name = %entity.name,
                current = %existing.status,
                desired = %entity.status,
                "component differs"
            );
            plan.updates.push(Update {
                id: existing.id.clone(),
                name: entity.name.clone(),
                status,
                group,
            });
        }
    }

    let dangling = components
        .values()
        .chain(groups.values())
        .filter(|e| !wanted.contains(&(e.kind, e.name.as_str())));
    // Keep deletes in listing order for stable output.
    let mut dangling: Vec<&TargetEntity> = dangling.copied().collect();
    dangling.sort_by_key(|e| listing_position(current, e));

    for entity in dangling {
        if allow_delete {
            debug!(name = %entity.name, id = %entity.id, kind = %entity.kind, "dangling, will delete");
            plan.deletes.push(entity.clone());
        } else {
            warn!(
                name = %entity.name,
                id = %entity.id,
                kind = %entity.kind,
                "exists on status page but not in monitoring source; deletion not allowed, skipping"
            );
            plan.skipped_deletes.push(entity.clone());
        }
    }

    plan
}

fn index_by_name<'a>(
    entities: &'a [TargetEntity],
    inconsistencies: &mut Vec<SyncError>,
) -> HashMap<&'a str, &'a TargetEntity> {
    let mut index: HashMap<&str, &TargetEntity> = HashMap::with_capacity(entities.len());
    for entity in entities {
        if let Some(first) = index.get(entity.name.as_str()) {
            let err = SyncError::TargetInconsistent(format!(
                "{} name '{}' is used by both {} and {}; keeping {}",
                entity.kind, entity.name, first.id, entity.id, first.id
            ));
            warn!(error = %err, "duplicate name on status page");
            inconsistencies.push(err);
            continue;
        }
        index.insert(entity.name.as_str(), entity);
    }
    index
}

fn group_change(
    desired: &DesiredEntity,
    current: &TargetEntity,
    groups: &HashMap<&str, &TargetEntity>,
) -> Option<GroupChange> {
    match &desired.parent_group {
        None => current.group_id.is_some().then_some(GroupChange::Detach),
        Some(name) => {
            let in_place = groups
                .get(name.as_str())
                .is_some_and(|g| current.group_id.as_deref() == Some(g.id.as_str()));
            (!in_place).then(|| GroupChange::Attach(name.clone()))
        }
    }
}

fn listing_position(snapshot: &TargetSnapshot, entity: &TargetEntity) -> usize {
    let list = match entity.kind {
        EntityKind::Component => &snapshot.components,
        EntityKind::ComponentGroup => &snapshot.groups,
    };
    list.iter()
        .position(|e| e.id == entity.id)
        .unwrap_or(usize::MAX)
}
