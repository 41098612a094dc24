use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use weather_playlist::api::AppState;
use weather_playlist::{AppConfig, PlaylistOrchestrator, VERSION, history, telemetry, web};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_from_path(config_path)?;
    config.require_credentials()?;

    let _telemetry = telemetry::init(&config.logging, &config.telemetry)?;
    info!("weather-playlist {} starting", VERSION);

    let history = history::open(&config)?;
    let orchestrator = PlaylistOrchestrator::from_config(&config, history)?;

    web::run(AppState::new(orchestrator), config.server.port).await
}
