mod config;
mod errors;
mod fetcher;
mod metrics;
mod model;
mod poller;
mod render;
mod rest;
mod store;
#[cfg(test)]
mod test_support;
mod timestamp;

use anyhow::Context;
use axum::{routing::get, Router};
use config::Config;
use fetcher::ChannelFetcher;
use poller::Poller;
use store::{AccumulationStore, StoreSettings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting sensor viewer");
    info!(
        "Telemetry store: {}:{} (service={}, servicepath={})",
        config.sth_host, config.sth_port, config.fiware_service, config.fiware_servicepath
    );
    info!("Entity: {} {}", config.entity_type, config.entity_id);
    info!(
        "Window: lastN={}, poll every {:?}, request timeout {:?}, timezone {}",
        config.window.last_n(),
        config.poll_interval,
        config.request_timeout,
        config.timezone
    );
    match config.luminosity_max_points {
        Some(cap) => info!("Luminosity history capped at {} points", cap),
        None => info!("Luminosity history is unbounded"),
    }

    metrics::init_metrics().context("Failed to register metrics")?;

    let fetcher = ChannelFetcher::new(&config).context("Failed to build HTTP client")?;
    let store = AccumulationStore::new(StoreSettings {
        max_points: config.luminosity_max_points,
        dedup: config.luminosity_dedup,
    });
    let (poller, dashboard_rx) = Poller::new(fetcher, store, config.timezone);

    let poll_interval = config.poll_interval;
    let poller_handle = tokio::spawn(async move {
        poller::run_poller(poller, poll_interval).await;
    });

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(dashboard_rx));

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = poller_handle => {
            error!("Poller task terminated");
        }
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
