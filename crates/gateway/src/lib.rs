//! HTTP API gateway for Parley.
//!
//! Exposes the conversation service over REST: a health check, thread
//! listing and history, sending messages, and the tool catalogue.
//!
//! Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use parley_config::GatewayConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use api_v1::{SharedService, status_for};

/// Build the full router: `/health` plus the v1 API.
///
/// Layers applied:
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(service: SharedService) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(service))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and run until Ctrl-C.
pub async fn start(service: SharedService, config: &GatewayConfig) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(service);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
