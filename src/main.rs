// src/main.rs
mod analyzer;
mod api;
mod catalog;
mod config;
mod export;
mod generator;
mod geometry;
mod model;
mod rules;
mod search;
mod types;
mod validator;

use config::AppConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("modular_housing=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = dotenv_result {
        if !err.not_found() {
            tracing::warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let generation = app_config.generation.generation_config().clone();

    tracing::info!(
        grid_max = generation.catalog.grid_max(),
        max_attempts = generation.max_overall_attempts,
        "Modular housing service starting"
    );
    if let Err(err) = api::start_api_server(api_config, generation).await {
        tracing::error!("Server stopped: {}", err);
        std::process::exit(1);
    }
}
