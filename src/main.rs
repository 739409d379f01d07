use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use odds_aggregator::api::health::HealthState;
use odds_aggregator::api::latency::LatencyStats;
use odds_aggregator::api::{router, ApiState};
use odds_aggregator::config::Config;
use odds_aggregator::error::Result;
use odds_aggregator::fetcher::fetch_locations;
use odds_aggregator::ws::FeedConnection;
use odds_aggregator::Engine;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let engine = Arc::new(Engine::new(cfg.list_type.clone()));
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    // --- REST bootstrap: location table for venue resolution ---
    match &cfg.locations_url {
        Some(url) => match fetch_locations(url).await {
            Ok(locations) => engine.store_locations(locations),
            Err(e) => warn!("Location bootstrap failed, venues will stay empty: {e}"),
        },
        None => info!("LOCATIONS_URL not set, venues resolve only from feed LOCATION records"),
    }

    // --- Push feed ---
    if cfg.feed_subscribe_msg.is_none() {
        warn!("FEED_SUBSCRIBE_MSG not set, relying on the feed to push without a subscribe frame");
    }
    let feed = FeedConnection::new(
        cfg.feed_url.clone(),
        cfg.feed_subscribe_msg.clone(),
        cfg.list_type.clone(),
        Arc::clone(&engine),
        Arc::clone(&health),
        Arc::clone(&latency),
    );
    tokio::spawn(async move { feed.run().await });
    info!("Feed task started, dumps filed under {}", cfg.list_type);

    // --- HTTP API server ---
    let app = router(ApiState { engine, health, latency });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
