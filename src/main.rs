use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

mod catalog;
mod config;
mod error;
mod generation;
mod server;
mod storage;

use crate::catalog::CatalogRegistry;
use crate::config::Config;
use crate::generation::{CommandEngine, GenerationManager};
use crate::server::AppState;
use crate::storage::ArtifactStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("musegen=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("🎵 Starting musegen v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("{}", config.summary());

    let store = ArtifactStore::new(config.generated_dir.clone(), config.max_generated_files)?;
    let registry = CatalogRegistry::from_config(&config);

    // Probe the generation engine once at startup. A failed probe is
    // fatal for the generation feature only; catalog endpoints keep
    // serving and /health reports modelLoaded=false.
    let engine = CommandEngine::new(config.engine_command.clone(), config.sample_rate);
    let manager = match engine.probe().await {
        Ok(()) => {
            info!("✅ Generation engine ready");
            Some(GenerationManager::start(Box::new(engine), config.queue_depth))
        }
        Err(probe_error) => {
            error!("❌ Engine probe failed: {}", probe_error);
            info!("🔄 Continuing without generation - catalog endpoints remain available");
            None
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState {
        config,
        registry,
        manager,
        store,
    });
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to register Ctrl+C handler");
    info!("⚠️ Shutdown signal received, closing...");
}
