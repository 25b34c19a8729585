//! Epi-Risk Web Server
//!
//! Run with: cargo run -p epirisk-web

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use epirisk_web::{config::Config, router::build_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &config.source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found, using defaults"),
    }

    info!("Starting {} v{}", config.api.title, config.api.version);
    config.ensure_dirs()?;

    let addr = config.bind_addr();
    let state = AppState::new(config)?;
    if !state.model_available() {
        info!("Serving with deterministic rules ({})", state.scorer.model_version());
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
