use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::StatuspageConfig;
use crate::domain::ports::{ComponentPatch, StatusTarget};
use crate::domain::types::{ComponentStatus, EntityKind, TargetEntity, TargetSnapshot};
use crate::error::{Result, SyncError};

/// Statuspage.io REST client scoped to a single page.
pub struct StatuspageClient {
    base_url: String,
    api_key: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ComponentRecord {
    id: String,
    name: String,
    #[serde(default)]
    status: Option<ComponentStatus>,
    #[serde(default)]
    group: bool,
    #[serde(default)]
    group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Serialize)]
struct NewComponent<'a> {
    name: &'a str,
    status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a str>,
}

impl StatuspageClient {
    pub fn new(config: &StatuspageConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building Statuspage HTTP client")?;
        Ok(Self {
            base_url: format!(
                "{}/v1/pages/{}",
                config.api_host.trim_end_matches('/'),
                config.page_id
            ),
            api_key: config.api_key.clone(),
            http,
        })
    }

    // ── Internal helpers ───────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("OAuth {}", self.api_key))
    }

    /// Send a mutation, mapping transport errors and non-2xx replies to `ApplyFailed`.
    async fn mutate(&self, operation: String, req: RequestBuilder) -> Result<Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| SyncError::apply_failed(operation.clone(), e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::apply_failed(
                operation,
                format!("status page returned {}: {}", status, body.trim()),
            ));
        }
        Ok(resp)
    }
}

#[async_trait]
impl StatusTarget for StatuspageClient {
    async fn list_entities(&self) -> Result<TargetSnapshot> {
        let url = format!("{}/components", self.base_url);
        debug!(url = %url, "listing status page components");
        let resp = self
            .request(Method::GET, "/components")
            .send()
            .await
            .map_err(|e| SyncError::TargetUnavailable(format!("GET {}: {}", url, e)))?;
        if !resp.status().is_success() {
            return Err(SyncError::TargetUnavailable(format!(
                "GET {} returned {}",
                url,
                resp.status()
            )));
        }
        let records: Vec<ComponentRecord> = resp
            .json()
            .await
            .map_err(|e| SyncError::TargetUnavailable(format!("parsing component listing: {}", e)))?;

        let mut snapshot = TargetSnapshot::default();
        for record in records {
            let kind = if record.group {
                EntityKind::ComponentGroup
            } else {
                EntityKind::Component
            };
            let entity = TargetEntity {
                id: record.id,
                name: record.name,
                kind,
                status: record.status.unwrap_or(ComponentStatus::Unknown),
                group_id: record.group_id.filter(|g| !g.is_empty()),
            };
            match kind {
                EntityKind::ComponentGroup => snapshot.groups.push(entity),
                EntityKind::Component => snapshot.components.push(entity),
            }
        }
        Ok(snapshot)
    }

    async fn create_group(&self, name: &str) -> Result<String> {
        let operation = format!("create component group '{}'", name);
        let resp = self
            .mutate(
                operation.clone(),
                self.request(Method::POST, "/component-groups").json(&json!({
                    "component_group": { "name": name, "components": [] }
                })),
            )
            .await?;
        created_id(operation, resp).await
    }

    async fn create_component(
        &self,
        name: &str,
        status: ComponentStatus,
        group_id: Option<&str>,
    ) -> Result<String> {
        let operation = format!("create component '{}'", name);
        let component = NewComponent {
            name,
            status,
            group_id,
        };
        let body = json!({ "component": component });
        let resp = self
            .mutate(
                operation.clone(),
                self.request(Method::POST, "/components").json(&body),
            )
            .await?;
        created_id(operation, resp).await
    }

    async fn update_component(&self, id: &str, patch: &ComponentPatch) -> Result<()> {
        let mut fields = Map::new();
        if let Some(status) = patch.status {
            fields.insert("status".into(), json!(status));
        }
        if let Some(group_id) = &patch.group_id {
            fields.insert("group_id".into(), json!(group_id));
        }
        if fields.is_empty() {
            return Ok(());
        }
        self.mutate(
            format!("update component {}", id),
            self.request(Method::PATCH, &format!("/components/{}", id))
                .json(&json!({ "component": Value::Object(fields) })),
        )
        .await?;
        Ok(())
    }

    async fn delete_entity(&self, id: &str, kind: EntityKind) -> Result<()> {
        let path = match kind {
            EntityKind::Component => format!("/components/{}", id),
            EntityKind::ComponentGroup => format!("/component-groups/{}", id),
        };
        self.mutate(
            format!("delete {} {}", kind, id),
            self.request(Method::DELETE, &path),
        )
        .await?;
        Ok(())
    }
}

async fn created_id(operation: String, resp: Response) -> Result<String> {
    let created: Created = resp
        .json()
        .await
        .map_err(|e| SyncError::apply_failed(operation, format!("reading created id: {}", e)))?;
    Ok(created.id)
}
