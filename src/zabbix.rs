//! Zabbix JSON-RPC client: the monitoring source.
//!
//! `service.get` returns every service as a flat list where each record names
//! its children in `dependencies`; the tree under the configured root is
//! rebuilt from that list.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ZabbixConfig;
use crate::domain::ports::{MonitoringSource, Session};
use crate::domain::types::{SourceNode, SourceStatus};
use crate::error::{Result, SyncError};

pub struct ZabbixClient {
    url: String,
    username: String,
    password: String,
    http: Client,
}

impl ZabbixClient {
    pub fn new(config: &ZabbixConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building Zabbix HTTP client")?;
        Ok(Self {
            url: format!("{}/api_jsonrpc.php", config.api_host.trim_end_matches('/')),
            username: config.username.clone(),
            password: config.password.clone(),
            http,
        })
    }

    // ── Internal helpers ───────────────────────────────────

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        session: Option<&Session>,
    ) -> Result<T> {
        let mut payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });
        if let Some(session) = session {
            payload["auth"] = Value::String(session.token().to_string());
        }

        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::SourceUnavailable(format!("POST {} ({}): {}", self.url, method, e)))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SyncError::Auth(format!("{} returned {}", self.url, resp.status())));
            }
            status if !status.is_success() => {
                return Err(SyncError::SourceUnavailable(format!(
                    "{} ({}) returned {}",
                    self.url, method, status
                )));
            }
            _ => {}
        }

        let body: RpcResponse<T> = resp.json().await.map_err(|e| {
            SyncError::SourceMalformed(format!("parsing {} response: {}", method, e))
        })?;

        match (body.result, body.error) {
            (_, Some(err)) if err.is_session_error() => Err(SyncError::Auth(err.to_string())),
            (_, Some(err)) => Err(SyncError::SourceUnavailable(format!("{}: {}", method, err))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(SyncError::SourceMalformed(format!(
                "{} response has neither result nor error",
                method
            ))),
        }
    }
}

#[async_trait]
impl MonitoringSource for ZabbixClient {
    async fn authenticate(&self) -> Result<Session> {
        debug!(url = %self.url, "authenticating to Zabbix");
        let token: String = self
            .call(
                "user.login",
                json!({ "user": self.username, "password": self.password }),
                None,
            )
            .await
            .map_err(|e| match e {
                SyncError::Auth(msg) => SyncError::Auth(msg),
                other => SyncError::Auth(other.to_string()),
            })?;
        if token.is_empty() {
            return Err(SyncError::Auth("user.login returned an empty session key".into()));
        }
        Ok(Session::new(token))
    }

    async fn fetch_service_tree(&self, session: &Session, root_id: &str) -> Result<SourceNode> {
        debug!(root = %root_id, "querying Zabbix services");
        let records: Vec<ServiceRecord> = self
            .call(
                "service.get",
                json!({ "selectDependencies": "extend" }),
                Some(session),
            )
            .await?;
        debug!(services = records.len(), "received Zabbix services");
        build_tree(&records, root_id)
    }
}

// ── Wire types ─────────────────────────────────────────────

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: String,
}

impl RpcError {
    fn is_session_error(&self) -> bool {
        let text = format!("{} {}", self.message, self.data).to_lowercase();
        ["not authori", "session terminated", "re-login"]
            .iter()
            .any(|needle| text.contains(needle))
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)?;
        if !self.data.is_empty() {
            write!(f, ": {}", self.data)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct ServiceRecord {
    serviceid: String,
    name: String,
    status: RawStatus,
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

#[derive(Deserialize)]
struct Dependency {
    serviceid: String,
}

/// Zabbix encodes numbers as strings, but accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawStatus {
    Number(i64),
    Text(String),
}

impl RawStatus {
    fn decode(&self) -> Option<SourceStatus> {
        let value = match self {
            RawStatus::Number(n) => *n,
            RawStatus::Text(s) => s.trim().parse().ok()?,
        };
        SourceStatus::from_zabbix(value)
    }
}

// ── Tree construction ──────────────────────────────────────

fn build_tree(records: &[ServiceRecord], root_id: &str) -> Result<SourceNode> {
    let index: HashMap<&str, &ServiceRecord> =
        records.iter().map(|r| (r.serviceid.as_str(), r)).collect();
    let root = index.get(root_id).ok_or_else(|| {
        SyncError::SourceMalformed(format!("root service {} not found", root_id))
    })?;
    let mut path = Vec::new();
    build_node(root, &index, &mut path)
}

fn build_node<'a>(
    record: &'a ServiceRecord,
    index: &HashMap<&str, &'a ServiceRecord>,
    path: &mut Vec<&'a str>,
) -> Result<SourceNode> {
    if path.contains(&record.serviceid.as_str()) {
        return Err(SyncError::SourceMalformed(format!(
            "service {} ('{}') depends on itself through {}",
            record.serviceid,
            record.name,
            path.join(" -> ")
        )));
    }

    let status = record.status.decode().ok_or_else(|| {
        SyncError::SourceMalformed(format!(
            "service {} ('{}') has an unrecognized status",
            record.serviceid, record.name
        ))
    })?;

    if record.dependencies.is_empty() {
        return Ok(SourceNode::leaf(&record.serviceid, &record.name, status));
    }

    path.push(&record.serviceid);
    let mut children = Vec::with_capacity(record.dependencies.len());
    for dep in &record.dependencies {
        let child = index.get(dep.serviceid.as_str()).copied().ok_or_else(|| {
            SyncError::SourceMalformed(format!(
                "service {} ('{}') depends on unknown service {}",
                record.serviceid, record.name, dep.serviceid
            ))
        })?;
        children.push(build_node(child, index, path)?);
    }
    path.pop();

    Ok(SourceNode::group(&record.serviceid, &record.name, status, children))
}
