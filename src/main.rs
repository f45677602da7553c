//! ccloud-secrets - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the secrets backend.

use ccloud_secrets::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ccloud_secrets=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: storage={:?}, data_dir={}, mount={}",
        config.storage_backend,
        config.data_dir.display(),
        config.mount_path
    );
    if config.seal_key.is_none() {
        info!("SEAL_KEY not set; config and roles are stored unencrypted");
    }

    api::serve(config).await?;

    Ok(())
}
