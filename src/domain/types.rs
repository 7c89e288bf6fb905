use std::fmt;

use serde::{Deserialize, Serialize};

// ── Source side ────────────────────────────────────────────

/// Severity reported by the monitoring source for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Information,
    Warning,
    Average,
    High,
    Disaster,
}

impl SourceStatus {
    /// Decode a Zabbix service status value.
    ///
    /// Zabbix < 6 reports `0` for a healthy service, newer releases report `-1`.
    pub fn from_zabbix(value: i64) -> Option<Self> {
        match value {
            -1 | 0 => Some(Self::Ok),
            1 => Some(Self::Information),
            2 => Some(Self::Warning),
            3 => Some(Self::Average),
            4 => Some(Self::High),
            5 => Some(Self::Disaster),
            _ => None,
        }
    }

    /// Map onto the status page vocabulary. Monotonic, and lossy at both ends.
    pub fn to_component_status(self) -> ComponentStatus {
        match self {
            Self::Ok | Self::Information => ComponentStatus::Operational,
            Self::Warning => ComponentStatus::DegradedPerformance,
            Self::Average => ComponentStatus::PartialOutage,
            Self::High | Self::Disaster => ComponentStatus::MajorOutage,
        }
    }
}

/// A node of the monitored service hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNode {
    pub id: String,
    pub name: String,
    pub status: SourceStatus,
    pub kind: SourceKind,
}

/// Leaf services have no children; groups own theirs, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "children", rename_all = "snake_case")]
pub enum SourceKind {
    Leaf,
    Group(Vec<SourceNode>),
}

impl SourceNode {
    pub fn leaf(id: impl Into<String>, name: impl Into<String>, status: SourceStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            kind: SourceKind::Leaf,
        }
    }

    pub fn group(
        id: impl Into<String>,
        name: impl Into<String>,
        status: SourceStatus,
        children: Vec<SourceNode>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            kind: SourceKind::Group(children),
        }
    }

    pub fn children(&self) -> &[SourceNode] {
        match &self.kind {
            SourceKind::Leaf => &[],
            SourceKind::Group(children) => children,
        }
    }

    /// Number of nodes in this subtree, excluding the node itself.
    pub fn descendant_count(&self) -> usize {
        self.children()
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

// ── Target side ────────────────────────────────────────────

/// Component status vocabulary of the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Operational,
    DegradedPerformance,
    PartialOutage,
    MajorOutage,
    UnderMaintenance,
    #[serde(other)]
    Unknown,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::DegradedPerformance => "degraded_performance",
            Self::PartialOutage => "partial_outage",
            Self::MajorOutage => "major_outage",
            Self::UnderMaintenance => "under_maintenance",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Component,
    ComponentGroup,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component => write!(f, "component"),
            Self::ComponentGroup => write!(f, "component group"),
        }
    }
}

/// What the status page should contain, derived fresh from the source every cycle.
/// `name` is the only identity shared by both systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredEntity {
    pub name: String,
    pub kind: EntityKind,
    pub status: ComponentStatus,
    pub parent_group: Option<String>,
}

/// An entity as it currently exists on the status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub status: ComponentStatus,
    pub group_id: Option<String>,
}

/// Full listing of the status page, partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub components: Vec<TargetEntity>,
    pub groups: Vec<TargetEntity>,
}

impl TargetSnapshot {
    pub fn len(&self) -> usize {
        self.components.len() + self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
