// Vélo'v forecast map server: marker colors driven by the forecast backend

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

use velov_forecast_map::client::ForecastClient;
use velov_forecast_map::config::Config;
use velov_forecast_map::fleet::SyncOutcome;
use velov_forecast_map::server::run_server;
use velov_forecast_map::state::AppState;
use velov_forecast_map::time::{SystemClock, TimeNormalizer};

async fn run(config: Config) -> anyhow::Result<()> {
    let tz = config.tz()?;
    let client = ForecastClient::with_options(
        &config.backend_url,
        config.request_timeout(),
        config.details_cache_capacity,
    )
    .with_context(|| format!("cannot use backend {}", config.backend_url))?;

    let state = AppState::new(Arc::new(client), Arc::new(SystemClock), TimeNormalizer::new(tz));

    log::info!("📡 Loading stations from {}...", config.backend_url);
    let count = state.reload_stations().await;
    if count == 0 {
        log::warn!("⚠️  No stations loaded; the map starts empty until /api/stations/reload succeeds");
    }

    match state.fleet_sync().sync().await {
        SyncOutcome::PredictionsUnavailable => log::warn!("⚠️  Initial sync found no predictions"),
        outcome => log::info!("✓ Initial sync: {:?}", outcome),
    }

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║   🚲 Vélo'v Forecast Map                                   ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");
    println!("📍 Available Routes:");
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│   GET  /api/markers                - All markers + colors   │");
    println!("│   GET  /api/markers/:id/tooltip    - Hover                  │");
    println!("│   GET  /api/markers/:id/popup      - Click                  │");
    println!("│   GET  /api/markers/:id/icon.svg   - Marker icon            │");
    println!("│   GET  /api/date                   - Selected instant       │");
    println!("│   PUT  /api/date                   - Select instant         │");
    println!("│   POST /api/refresh                - Recolor all markers    │");
    println!("│   POST /api/stations/reload        - Reload stations        │");
    println!("│   GET  /api/search?q=              - Search stations        │");
    println!("│   GET  /api/weather                - Weather forecast       │");
    println!("│   GET  /health                     - Health check           │");
    println!("└─────────────────────────────────────────────────────────────┘\n");

    run_server(state, (config.bind.clone(), config.port), config.refresh_interval())
        .await
        .context("marker service stopped")
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    config.log();

    if let Err(e) = actix_web::rt::System::new().block_on(run(config)) {
        log::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}
