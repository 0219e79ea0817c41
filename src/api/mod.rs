// src/api/mod.rs — HTTP API server

pub mod auth;
pub mod handlers;
pub mod types;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::billing::Billing;
use crate::infra::config::ServerConfig;
use crate::ledger::Ledger;
use crate::orchestrator::Orchestrator;
use crate::session::SessionAuthority;

/// Shared state for API handlers. Holds only injected capabilities; no
/// handler touches storage directly.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionAuthority>,
    pub ledger: Arc<Ledger>,
    pub billing: Arc<Billing>,
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState, config: &ServerConfig) -> Router {
    let origins: Vec<axum::http::HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/v1/auth/register", post(handlers::register))
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/logout", post(handlers::logout))
        .route("/api/v1/auth/me", get(handlers::me))
        .route("/api/v1/research", post(handlers::research))
        .route("/api/v1/balance", get(handlers::balance))
        .route("/api/v1/usage", get(handlers::usage))
        .route("/api/v1/billing/purchase", post(handlers::purchase))
        .route("/api/v1/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the configured port (blocking).
pub async fn start_server(config: &ServerConfig, state: ApiState) -> anyhow::Result<()> {
    let addr = format!("127.0.0.1:{}", config.port);

    let router = build_router(state, config);

    tracing::info!("API server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
