use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::domain::run_state::HealthState;
use crate::scheduler::{SharedStatus, StatusSnapshot};

/// Shared application state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub status: SharedStatus,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub version: &'static str,
    pub state: HealthState,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/state", get(run_state))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the status endpoint until the process exits.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!(addr = %addr, "status endpoint listening");
    axum::serve(listener, router(state).into_make_service())
        .await
        .context("status endpoint error")
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        version: env!("CARGO_PKG_VERSION"),
        state: state.status.read().await.state,
    })
}

async fn run_state(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.read().await.clone())
}
