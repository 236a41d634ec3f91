use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use reqwest::Client;
use scrape_api::client::ApiClient;
use scrape_api::fetch::HttpFetcher;
use scrape_api::server;
use scrape_api::utils::config_loader;
use scrape_api::utils::constants::DEFAULT_CONFIG_PATH;
use scrape_api::utils::logging::{self, LogLevel};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, set up logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level)?;

    // -------------------------------
    // 2. Create request client and sources
    // -------------------------------

    let fetcher = Arc::new(HttpFetcher::new(
        Client::new(),
        service_config.settings.retry.clone(),
    ));
    let client = Arc::new(ApiClient::from_config(&service_config, fetcher)?);

    // -------------------------------
    // 3. Serve endpoints and metrics
    // -------------------------------

    info!(
        sources = service_config.sources.len(),
        endpoints = service_config.endpoints.len(),
        "Service starting..."
    );
    server::server::start(&service_config, client).await
}
