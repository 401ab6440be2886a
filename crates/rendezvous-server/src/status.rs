//! HTTP status surface: liveness and registered-peer count.

use crate::relay::PresenceRegistry;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use rendezvous_core::{RendezvousError, RendezvousResult};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const SERVICE_NAME: &str = "Rendezvous Signaling Server";

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub connected_users: usize,
    pub version: &'static str,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub users: usize,
}

/// Build the status router. CORS is open to every origin.
pub fn router(registry: Arc<PresenceRegistry>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

/// Serve the status router on `addr` until the process exits.
pub async fn serve(addr: SocketAddr, registry: Arc<PresenceRegistry>) -> RendezvousResult<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RendezvousError::Transport(format!("status bind failed: {e}")))?;
    info!(addr = %listener.local_addr()?, "status endpoint started");
    axum::serve(listener, router(registry))
        .await
        .map_err(|e| RendezvousError::Transport(format!("status server failed: {e}")))
}

/// GET /
async fn index_handler(State(registry): State<Arc<PresenceRegistry>>) -> Json<IndexResponse> {
    Json(IndexResponse {
        status: "online",
        service: SERVICE_NAME,
        connected_users: registry.count().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health
async fn health_handler(State(registry): State<Arc<PresenceRegistry>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        users: registry.count().await,
    })
}
