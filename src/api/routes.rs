//! HTTP router and server.

use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::backend::Backend;
use crate::config::Config;
use crate::issuer::CCloudIssuerFactory;
use crate::storage::create_storage;

use super::config as config_api;
use super::creds as creds_api;
use super::leases::{self, LeasePolicy, LeaseTracker};
use super::roles as roles_api;
use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// The secrets backend
    pub backend: Arc<Backend>,
    /// Outstanding leases
    pub leases: LeaseTracker,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<Backend>) -> Arc<Self> {
        let leases = LeaseTracker::new(
            config.mount_path.clone(),
            LeasePolicy::from(&config.lease),
        );
        Arc::new(Self {
            config,
            backend,
            leases,
        })
    }
}

/// Build the router for all `/v1/` endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .nest("/v1/config", config_api::routes())
        .nest("/v1/role", roles_api::routes())
        .nest("/v1/creds", creds_api::routes())
        .nest("/v1/leases", leases::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let storage = create_storage(
        config.storage_backend,
        config.data_dir.clone(),
        config.seal_key,
    )
    .await?;
    tracing::info!(
        backend = ?config.storage_backend,
        persistent = storage.is_persistent(),
        sealed = config.seal_key.is_some(),
        "Storage initialized"
    );

    let backend = Arc::new(Backend::new(storage, Arc::new(CCloudIssuerFactory)));
    let state = AppState::new(config.clone(), backend);

    let sweeper = leases::spawn_expiry_sweeper(Arc::clone(&state), config.lease.sweep_interval);

    let app = router(Arc::clone(&state));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {} (mount {})", addr, config.mount_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    let outstanding = state.leases.len().await;
    if outstanding > 0 {
        tracing::warn!(
            outstanding,
            "Shutting down with outstanding leases; their keys will not be revoked automatically"
        );
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// GET /v1/health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        outstanding_leases: state.leases.len().await,
    })
}
