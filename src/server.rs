//! HTTP server initialization and routing.

use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use log::info;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::campaigns::configure_campaign_routes;
use crate::core::invitations::configure_invitation_routes;
use crate::core::organization::configure_org_routes;
use crate::integrations::configure_integration_routes;
use crate::jobs::configure_job_routes;
use crate::shared::state::AppState;
use crate::sync::configure_sync_routes;

async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({"status": "healthy", "service": "adserver"})),
    )
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(configure_sync_routes())
        .merge(configure_campaign_routes())
        .merge(configure_job_routes())
        .merge(configure_integration_routes())
        .merge(configure_org_routes())
        .merge(configure_invitation_routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.port));
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("adserver listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received, draining connections");
}
