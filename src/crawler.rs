use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, REFERER, USER_AGENT,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Span};

use crate::browser::{BrowserEngine, SessionGuard};
use crate::delay::DelayProvider;
use crate::error::{ScrapeError, ScrapeResult};

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    ]
});

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENT)
}

/// Produces the HTML of a page, one way or another.
#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> ScrapeResult<String>;
}

// ============================================================================
// Static tier: plain GET dressed up as a desktop browser
// ============================================================================

pub struct StaticFetcher {
    client: reqwest::Client,
}

impl StaticFetcher {
    pub fn new(timeout: Duration) -> ScrapeResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HtmlFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> ScrapeResult<String> {
        let user_agent = random_user_agent();
        debug!(user_agent, "static fetch");

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(ACCEPT_ENCODING, "gzip, deflate, br")
            .header(CONNECTION, "keep-alive")
            .header(REFERER, "https://www.google.com/")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Network(format!(
                "{} responded with HTTP {}",
                resp.url(),
                status
            )));
        }

        let html = resp.text().await?;
        info!("Fetched static HTML: {} bytes", html.len());
        Ok(html)
    }
}

// ============================================================================
// Dynamic tier: one throwaway headless browser per call
// ============================================================================

pub struct DynamicFetcher {
    engine: Arc<dyn BrowserEngine>,
    delay: Arc<dyn DelayProvider>,
    idle_timeout: Duration,
}

impl DynamicFetcher {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        delay: Arc<dyn DelayProvider>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            delay,
            idle_timeout,
        }
    }
}

/// headless_chrome blocks, so browser work runs on the blocking pool.
async fn run_blocking<T, F>(task: F) -> ScrapeResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ScrapeResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ScrapeError::Render(format!("browser task aborted: {e}")))?
}

#[async_trait]
impl HtmlFetcher for DynamicFetcher {
    async fn fetch(&self, url: &str) -> ScrapeResult<String> {
        let engine = Arc::clone(&self.engine);
        let target = url.to_string();
        let idle_timeout = self.idle_timeout;
        let dwell = self.delay.next_delay();
        let span = Span::current();

        // The session lives and dies on one blocking thread. If the caller
        // goes away mid-render the task still runs on and the guard closes
        // the browser there, never on an async worker.
        let html = run_blocking(move || {
            let _entered = span.enter();
            let mut session = SessionGuard::new(engine.launch()?);
            info!("Navigating to: {}", target);
            session.navigate(&target)?;
            session.wait_for_network_idle(idle_timeout)?;

            debug!(dwell_ms = dwell.as_millis() as u64, "waiting before capture");
            std::thread::sleep(dwell);

            let html = session.content()?;
            Ok(html)
        })
        .await?;

        info!("Extracted HTML size via Browser: {} bytes", html.len());
        Ok(html)
    }
}
