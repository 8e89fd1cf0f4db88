//! Cluster Sim Control - cluster simulator daemon
//!
//! Runs a cluster store over the in-memory backend together with the
//! background health monitor, and exposes process probes.
//!
//! # HTTP Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /ready` - Readiness check (503 once shutdown has begun)

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use cluster_sim_backend::SimulatedBackend;
use cluster_sim_control::{ClusterConfig, ClusterStore, HealthMonitor};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<ClusterStore<SimulatedBackend>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    total_cpus: u64,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "cluster-sim-control",
    })
}

async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.store.is_accepting();
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        ready,
        total_cpus: state.store.total_cpus().await,
    };
    (code, Json(body))
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cluster_sim=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cluster Sim Control");

    let config = ClusterConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        health_interval_secs = config.health_interval_secs,
        inspect_timeout_secs = config.inspect_timeout_secs,
        default_policy = %config.default_policy,
        "Loaded cluster configuration"
    );

    let listen_addr = config.listen_addr.clone();
    let backend = Arc::new(SimulatedBackend::new());
    let store = Arc::new(ClusterStore::new(backend, config));

    // Start the health monitor as a background task
    let monitor = HealthMonitor::new(Arc::clone(&store)).spawn();

    let app = create_router(AppState {
        store: Arc::clone(&store),
    });

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor.stop().await;
    let stopped = store.shutdown().await;
    tracing::info!(stopped, "Cluster Sim Control stopped");

    Ok(())
}
