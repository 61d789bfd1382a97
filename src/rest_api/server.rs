//! Axum HTTP server for metrics and health

use std::net::SocketAddr;

use axum::{http::StatusCode, routing::get, Router};
use prometheus_client::encoding::text::encode;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::controller::metrics::REGISTRY;
use crate::error::{Error, Result};

async fn health() -> &'static str {
    "ok"
}

/// Metrics endpoint handler
async fn metrics_handler() -> (StatusCode, String) {
    let mut buffer = String::new();
    match encode(&mut buffer, &REGISTRY) {
        Ok(()) => (StatusCode::OK, buffer),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
}

/// Run the metrics and health server until the process shuts down
pub async fn run_server(addr: SocketAddr) -> Result<()> {
    info!("Metrics server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, router())
        .await
        .map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

    Ok(())
}
