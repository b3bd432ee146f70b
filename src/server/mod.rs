//! HTTP surface: `POST /generate`, `GET /download/*path`, `GET /` and `GET /health`.
//!
//! Generation is synchronous: the `/generate` response is only sent once the
//! book has been rendered and stored, which can take as long as the slowest
//! subchapter request.

pub mod error;
pub mod handlers;
pub mod state;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::load_config::BookgenConfig;

pub use error::ServiceError;
pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/generate", post(handlers::generate))
        .route("/download/*path", get(handlers::download))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(config: &BookgenConfig) -> Result<()> {
    let state = AppState::from_config(config).await?;
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("bookgen listening on {}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  - POST /generate");
    tracing::info!("  - GET  /download/<path>");
    tracing::info!("  - GET  /health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
