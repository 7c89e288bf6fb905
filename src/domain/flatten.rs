//! Tree flattener: maps the source hierarchy onto one level of grouping.
//!
//! Children of the root become either ungrouped components (leaves) or
//! component groups (groups). Members of a group must all be leaves: the
//! status page cannot nest groups, so a nested group is rejected rather
//! than silently flattened.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{Result, SyncError};

use super::types::{DesiredEntity, EntityKind, SourceKind, SourceNode};

/// Flatten the subtree under `root` into desired entities, depth-first.
///
/// The root itself is not emitted. A group is always emitted before its members.
pub fn flatten(root: &SourceNode) -> Result<Vec<DesiredEntity>> {
    let mut entities = Vec::with_capacity(root.descendant_count());
    let mut seen = HashSet::new();

    for child in root.children() {
        claim_name(&mut seen, child)?;
        match &child.kind {
            SourceKind::Leaf => {
                debug!(id = %child.id, name = %child.name, "found ungrouped service");
                entities.push(component(child, None));
            }
            SourceKind::Group(members) => {
                debug!(
                    id = %child.id,
                    name = %child.name,
                    members = members.len(),
                    "found service group"
                );
                entities.push(DesiredEntity {
                    name: child.name.clone(),
                    kind: EntityKind::ComponentGroup,
                    status: child.status.to_component_status(),
                    parent_group: None,
                });

                for member in members {
                    if let SourceKind::Group(_) = member.kind {
                        return Err(SyncError::SourceMalformed(format!(
                            "service '{}' (id {}) inside group '{}' has children of its own; \
                             component groups cannot be nested",
                            member.name, member.id, child.name
                        )));
                    }
                    claim_name(&mut seen, member)?;
                    debug!(
                        id = %member.id,
                        name = %member.name,
                        group = %child.name,
                        "found grouped service"
                    );
                    entities.push(component(member, Some(&child.name)));
                }
            }
        }
    }

    Ok(entities)
}

fn component(node: &SourceNode, group: Option<&str>) -> DesiredEntity {
    DesiredEntity {
        name: node.name.clone(),
        kind: EntityKind::Component,
        status: node.status.to_component_status(),
        parent_group: group.map(str::to_string),
    }
}

fn claim_name<'a>(seen: &mut HashSet<&'a str>, node: &'a SourceNode) -> Result<()> {
    if !seen.insert(node.name.as_str()) {
        return Err(SyncError::SourceMalformed(format!(
            "service name '{}' (id {}) is used more than once; names must be unique across the whole tree",
            node.name, node.id
        )));
    }
    Ok(())
}
