//! Main entry point for the SD Bridge Gateway

use sd_bridge_gateway::{
    api,
    backend::HttpBackend,
    config::Settings,
    pool::{JsonFileStore, PoolStore},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "pretty" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }

    info!("Starting SD Bridge Gateway");
    info!(
        "Loaded configuration: server={}:{} state={}",
        settings.server.host, settings.server.port, settings.state.path
    );

    // Pool document store
    let store: Arc<dyn PoolStore> = Arc::new(JsonFileStore::new(&settings.state.path));
    let pool = store.load().await?;
    info!(
        endpoints = pool.api_endpoints.len(),
        enabled = pool.enabled_count(),
        "Loaded endpoint pool"
    );

    // Upstream client
    let backend = Arc::new(HttpBackend::new(Duration::from_secs(
        settings.download.timeout_secs,
    ))?);

    let sweep_interval = settings.maintenance.ban_sweep_interval_secs;
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    // Create application state
    let app_state = Arc::new(AppState::new(settings, store, backend));

    // Start ban sweeper background task
    app_state.ban_sweeper.start(sweep_interval).await;

    // Build the router
    let app = api::create_router(app_state.clone());

    info!("Server listening on {}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    app_state.ban_sweeper.stop().await;

    Ok(())
}
