//! In-memory implementations of the capability traits for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::ports::{AlertSink, ComponentPatch, MonitoringSource, Session, StatusTarget};
use crate::domain::types::{ComponentStatus, EntityKind, SourceNode, TargetEntity, TargetSnapshot};
use crate::error::{Result, SyncError};

// ── Source ─────────────────────────────────────────────────

pub struct FakeSource {
    tree: Mutex<Result<SourceNode>>,
    pub auth_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    /// Number of upcoming fetches rejected as if the session had expired.
    expired_fetches: AtomicUsize,
    latency: Mutex<Duration>,
    fetch_started: Mutex<Vec<Instant>>,
}

impl FakeSource {
    pub fn new(tree: SourceNode) -> Self {
        Self {
            tree: Mutex::new(Ok(tree)),
            auth_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            expired_fetches: AtomicUsize::new(0),
            latency: Mutex::new(Duration::ZERO),
            fetch_started: Mutex::new(Vec::new()),
        }
    }

    /// Make every fetch take `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// When each fetch began, in order.
    pub fn fetch_started(&self) -> Vec<Instant> {
        self.fetch_started.lock().unwrap().clone()
    }

    pub fn set_tree(&self, tree: SourceNode) {
        *self.tree.lock().unwrap() = Ok(tree);
    }

    pub fn fail_with(&self, err: SyncError) {
        *self.tree.lock().unwrap() = Err(err);
    }

    pub fn expire_sessions(&self, fetches: usize) {
        self.expired_fetches.store(fetches, Ordering::SeqCst);
    }
}

#[async_trait]
impl MonitoringSource for FakeSource {
    async fn authenticate(&self) -> Result<Session> {
        let n = self.auth_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Session::new(format!("token-{}", n)))
    }

    async fn fetch_service_tree(&self, _session: &Session, _root_id: &str) -> Result<SourceNode> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_started.lock().unwrap().push(Instant::now());
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let expired = self
            .expired_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if expired {
            return Err(SyncError::Auth("session terminated".into()));
        }
        self.tree.lock().unwrap().clone()
    }
}

// ── Target ─────────────────────────────────────────────────

#[derive(Default)]
struct TargetState {
    snapshot: TargetSnapshot,
    next_id: usize,
    calls: Vec<String>,
    failing_names: HashSet<String>,
    unavailable: bool,
}

#[derive(Default)]
pub struct FakeTarget {
    state: Mutex<TargetState>,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: TargetSnapshot) -> Self {
        Self {
            state: Mutex::new(TargetState {
                snapshot,
                ..Default::default()
            }),
        }
    }

    /// Make every mutation touching `name` fail.
    pub fn fail_on(&self, name: &str) {
        self.state.lock().unwrap().failing_names.insert(name.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn snapshot(&self) -> TargetSnapshot {
        self.state.lock().unwrap().snapshot.clone()
    }

    /// Mutating calls received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn name_of(state: &TargetState, id: &str) -> Option<String> {
        state
            .snapshot
            .components
            .iter()
            .chain(&state.snapshot.groups)
            .find(|e| e.id == id)
            .map(|e| e.name.clone())
    }

    fn check(state: &TargetState, operation: &str, name: &str) -> Result<()> {
        if state.failing_names.contains(name) {
            return Err(SyncError::apply_failed(operation, "HTTP 422 Unprocessable Entity"));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusTarget for FakeTarget {
    async fn list_entities(&self) -> Result<TargetSnapshot> {
        let state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(SyncError::TargetUnavailable("HTTP 503 Service Unavailable".into()));
        }
        Ok(state.snapshot.clone())
    }

    async fn create_group(&self, name: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_group {}", name));
        Self::check(&state, "create component group", name)?;
        state.next_id += 1;
        let id = format!("g{}", state.next_id);
        state.snapshot.groups.push(TargetEntity {
            id: id.clone(),
            name: name.to_string(),
            kind: EntityKind::ComponentGroup,
            status: ComponentStatus::Operational,
            group_id: None,
        });
        Ok(id)
    }

    async fn create_component(
        &self,
        name: &str,
        status: ComponentStatus,
        group_id: Option<&str>,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "create_component {} {} group={}",
            name,
            status,
            group_id.unwrap_or("-")
        ));
        Self::check(&state, "create component", name)?;
        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state.snapshot.components.push(TargetEntity {
            id: id.clone(),
            name: name.to_string(),
            kind: EntityKind::Component,
            status,
            group_id: group_id.map(str::to_string),
        });
        Ok(id)
    }

    async fn update_component(&self, id: &str, patch: &ComponentPatch) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "update_component {} status={} group={}",
            id,
            patch.status.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            match &patch.group_id {
                None => "-".to_string(),
                Some(None) => "none".to_string(),
                Some(Some(g)) => g.clone(),
            }
        ));
        let name = Self::name_of(&state, id).unwrap_or_default();
        Self::check(&state, "update component", &name)?;
        let component = state
            .snapshot
            .components
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| SyncError::apply_failed("update component", "HTTP 404 Not Found"))?;
        if let Some(status) = patch.status {
            component.status = status;
        }
        if let Some(group_id) = &patch.group_id {
            component.group_id = group_id.clone();
        }
        Ok(())
    }

    async fn delete_entity(&self, id: &str, kind: EntityKind) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let label = match kind {
            EntityKind::Component => "component",
            EntityKind::ComponentGroup => "group",
        };
        state.calls.push(format!("delete_{} {}", label, id));
        let name = Self::name_of(&state, id).unwrap_or_default();
        Self::check(&state, "delete", &name)?;
        let list = match kind {
            EntityKind::Component => &mut state.snapshot.components,
            EntityKind::ComponentGroup => &mut state.snapshot.groups,
        };
        list.retain(|e| e.id != id);
        Ok(())
    }
}

// ── Alerts ─────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeAlerts {
    messages: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl FakeAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for FakeAlerts {
    async fn post(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if *self.failing.lock().unwrap() {
            return Err(SyncError::AlertDeliveryFailed("HTTP 500".into()));
        }
        Ok(())
    }
}
