//! Capability interfaces the sync engine consumes.
//!
//! The HTTP adapters in `crate::zabbix`, `crate::statuspage` and
//! `crate::webhook` implement these; tests use the in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{ComponentStatus, EntityKind, SourceNode, TargetSnapshot};

/// An authenticated session with the monitoring source.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

#[async_trait]
pub trait MonitoringSource: Send + Sync {
    /// Fails with `SyncError::Auth`.
    async fn authenticate(&self) -> Result<Session>;

    /// Fails with `Auth` when the session is no longer accepted,
    /// `SourceUnavailable` or `SourceMalformed`.
    async fn fetch_service_tree(&self, session: &Session, root_id: &str) -> Result<SourceNode>;
}

/// Changed fields of a component. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentPatch {
    pub status: Option<ComponentStatus>,
    /// `Some(None)` detaches the component from its group.
    pub group_id: Option<Option<String>>,
}

#[async_trait]
pub trait StatusTarget: Send + Sync {
    /// Fails with `TargetUnavailable`.
    async fn list_entities(&self) -> Result<TargetSnapshot>;

    async fn create_group(&self, name: &str) -> Result<String>;

    async fn create_component(
        &self,
        name: &str,
        status: ComponentStatus,
        group_id: Option<&str>,
    ) -> Result<String>;

    async fn update_component(&self, id: &str, patch: &ComponentPatch) -> Result<()>;

    async fn delete_entity(&self, id: &str, kind: EntityKind) -> Result<()>;
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Fails with `AlertDeliveryFailed`. Callers log and swallow the error.
    async fn post(&self, message: &str) -> Result<()>;
}
