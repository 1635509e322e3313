/*
 * Swapdesk - Quote, Approve and Swap Checkout Service
 * Main entry point for the application
 */

use anyhow::Context;
use std::sync::Arc;
use swapdesk::{api, config::Config, service::CheckoutService};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(&config.server.log_level);

    info!("Starting Swapdesk Checkout Service");
    info!("Configuration loaded successfully");

    let checkout_service = CheckoutService::new(config.clone())
        .await
        .map_err(|e| {
            error!("Failed to initialize checkout service: {}", e);
            e
        })
        .context("Failed to connect to the chain")?;

    // Sanity check that quotes work before accepting traffic
    match checkout_service.item_price(None).await {
        Ok(report) => info!(
            "Block {}: {} {} = {} {}",
            report.block_number,
            report.item_price_listing,
            report.listing_token,
            report.item_price_settlement,
            report.settlement_token
        ),
        Err(e) => error!("Initial price check failed: {}", e),
    }

    let api_state = api::ApiState {
        config: config.clone(),
        checkout_service: Arc::new(checkout_service),
    };

    info!("Starting API server on {}:{}", config.server.host, config.server.port);

    let rocket = api::create_rocket(api_state);
    rocket.launch().await.context("API server failed")?;

    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("swapdesk={log_level}").into());

    let json = std::env::var("LOG_FORMAT").map_or(false, |format| format == "json");
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
