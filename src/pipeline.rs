//! Static-then-dynamic extraction.
//!
//! A scrape starts with a plain HTTP fetch. If that page lacks a name or a
//! price the same URL is rendered in a headless browser and that result is
//! final. Hard failures end the scrape on the spot; only an incomplete page
//! escalates to the browser.

use reqwest::Url;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::crawler::HtmlFetcher;
use crate::document::ProductPage;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::extract_product;
use crate::product::ProductRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: ProductRecord,
    pub attempt: Attempt,
}

pub struct ExtractionPipeline {
    static_fetcher: Arc<dyn HtmlFetcher>,
    dynamic_fetcher: Arc<dyn HtmlFetcher>,
}

impl ExtractionPipeline {
    pub fn new(static_fetcher: Arc<dyn HtmlFetcher>, dynamic_fetcher: Arc<dyn HtmlFetcher>) -> Self {
        Self {
            static_fetcher,
            dynamic_fetcher,
        }
    }

    /// Never fails: errors come back as a record carrying only `error`.
    pub async fn scrape(&self, url: &str) -> ProductRecord {
        let span = info_span!("scrape", request_id = %Uuid::new_v4(), url);
        async {
            match self.run(url).await {
                Ok(Extraction { record, attempt }) => {
                    info!(?attempt, complete = record.is_complete(), "✅ Extraction finished");
                    record
                }
                Err(e) => {
                    warn!("❌ Scrape failed: {}", e);
                    ProductRecord::failed(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn run(&self, url: &str) -> ScrapeResult<Extraction> {
        let base_url = parse_target(url)?;
        let mut attempt = Attempt::Static;

        loop {
            let html = self.fetcher_for(attempt).fetch(url).await?;
            let record = extract_from_html(&html, base_url.clone())?;

            match attempt {
                Attempt::Static if !record.is_complete() => {
                    info!(
                        has_name = record.name.is_some(),
                        has_price = record.price.is_some(),
                        "Static page incomplete, rendering with browser"
                    );
                    attempt = Attempt::Dynamic;
                }
                _ => return Ok(Extraction { record, attempt }),
            }
        }
    }

    fn fetcher_for(&self, attempt: Attempt) -> &dyn HtmlFetcher {
        match attempt {
            Attempt::Static => self.static_fetcher.as_ref(),
            Attempt::Dynamic => self.dynamic_fetcher.as_ref(),
        }
    }
}

fn parse_target(url: &str) -> ScrapeResult<Url> {
    let invalid = |reason: String| ScrapeError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

/// Kept synchronous: the parsed tree is not `Send` and must not live across
/// an await.
fn extract_from_html(html: &str, base_url: Url) -> ScrapeResult<ProductRecord> {
    let page = ProductPage::parse(html, Some(base_url))?;
    Ok(extract_product(&page))
}
