mod api;
mod browser;
mod config;
mod crawler;
mod delay;
mod document;
mod error;
mod extract;
mod pipeline;
mod product;

use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::browser::ChromeEngine;
use crate::config::ServiceConfig;
use crate::crawler::{DynamicFetcher, StaticFetcher};
use crate::pipeline::ExtractionPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::from_env().context("failed to load configuration")?;

    let static_fetcher =
        StaticFetcher::new(config.http_timeout).context("failed to build HTTP client")?;
    let dynamic_fetcher = DynamicFetcher::new(
        Arc::new(ChromeEngine::new(config.browser.clone())),
        config.delay_provider(),
        config.browser.idle_timeout,
    );
    let pipeline = ExtractionPipeline::new(Arc::new(static_fetcher), Arc::new(dynamic_fetcher));

    let state = Arc::new(api::AppState {
        pipeline: Arc::new(pipeline),
    });
    let app = api::router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🚀 Product scraper listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
