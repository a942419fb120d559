//! Headless browser seam.
//!
//! The dynamic fetcher talks to a `BrowserEngine` that hands out one
//! `BrowserSession` per call. Sessions are never shared or reused; a
//! `SessionGuard` owns each one and closes it exactly once on drop.

use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::BrowserSettings;
use crate::crawler::random_user_agent;
use crate::error::{ScrapeError, ScrapeResult};

/// How long the resource count must hold still before the page counts as idle.
const IDLE_WINDOW: Duration = Duration::from_millis(500);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `-1` until the load event, then the number of fetched resources.
const RESOURCE_COUNT_JS: &str = "document.readyState === 'complete' \
     ? performance.getEntriesByType('resource').length : -1";

pub trait BrowserEngine: Send + Sync {
    fn launch(&self) -> ScrapeResult<Box<dyn BrowserSession>>;
}

/// A single open page in a private browser instance. Calls block.
pub trait BrowserSession: Send {
    fn navigate(&mut self, url: &str) -> ScrapeResult<()>;
    /// Best effort: returning `Ok` after the timeout is allowed.
    fn wait_for_network_idle(&mut self, timeout: Duration) -> ScrapeResult<()>;
    fn content(&mut self) -> ScrapeResult<String>;
    fn close(&mut self);
}

pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self { session }
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}

// ============================================================================
// Chrome via headless_chrome
// ============================================================================

pub struct ChromeEngine {
    settings: BrowserSettings,
}

impl ChromeEngine {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

fn render_error(context: &str) -> impl Fn(anyhow::Error) -> ScrapeError + '_ {
    move |e| ScrapeError::Render(format!("{context}: {e}"))
}

impl BrowserEngine for ChromeEngine {
    fn launch(&self) -> ScrapeResult<Box<dyn BrowserSession>> {
        let user_agent = random_user_agent();
        debug!(user_agent, "launching headless browser");

        let ua_arg = format!("--user-agent={}", user_agent);
        let args = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-infobars"),
            OsStr::new("--lang=en-US"),
            OsStr::new(&ua_arg),
        ];

        let browser = Browser::new(LaunchOptions {
            headless: true,
            sandbox: false,
            window_size: Some((1920, 1080)),
            path: self.settings.chrome_path.clone(),
            // Watchdog for a browser left behind by a wedged blocking task.
            idle_browser_timeout: self.settings.navigation_timeout * 2,
            args,
            ..Default::default()
        })
        .map_err(render_error("failed to launch browser"))?;

        let tab = browser
            .new_tab()
            .map_err(render_error("failed to open tab"))?;
        tab.set_default_timeout(self.settings.navigation_timeout);

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
        }))
    }
}

struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn resource_count(&self) -> ScrapeResult<i64> {
        let result = self
            .tab
            .evaluate(RESOURCE_COUNT_JS, false)
            .map_err(render_error("failed to inspect page"))?;
        Ok(result.value.and_then(|v| v.as_i64()).unwrap_or(-1))
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> ScrapeResult<()> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| ScrapeError::Render(format!("navigation to {url} failed: {e}")))?;
        Ok(())
    }

    fn wait_for_network_idle(&mut self, timeout: Duration) -> ScrapeResult<()> {
        let deadline = Instant::now() + timeout;
        let mut last_count = self.resource_count()?;
        let mut stable_since = Instant::now();

        loop {
            std::thread::sleep(IDLE_POLL_INTERVAL);
            let count = self.resource_count()?;
            let now = Instant::now();

            if count != last_count || count < 0 {
                last_count = count;
                stable_since = now;
            } else if now.duration_since(stable_since) >= IDLE_WINDOW {
                debug!(resources = count, "network idle");
                return Ok(());
            }

            if now >= deadline {
                warn!(
                    "Network still busy after {:?}. Attempting extraction anyway...",
                    timeout
                );
                return Ok(());
            }
        }
    }

    fn content(&mut self) -> ScrapeResult<String> {
        self.tab
            .get_content()
            .map_err(render_error("failed to capture page content"))
    }

    fn close(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("tab close failed: {}", e);
        }
        // Dropping the last handle kills the browser process.
        if self.browser.take().is_some() {
            debug!("browser closed");
        }
    }
}
