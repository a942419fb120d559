use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::delay::{DelayProvider, FixedDelay, RandomDelay};

/// Runtime settings, read from the environment (and `.env` via dotenv).
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub http_timeout: Duration,
    pub browser: BrowserSettings,
    pub delay_min: Duration,
    pub delay_max: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSettings {
    pub chrome_path: Option<PathBuf>,
    pub navigation_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_path: None,
            navigation_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            http_timeout: Duration::from_secs(parse_or(&lookup, "SCRAPER_HTTP_TIMEOUT_SECS", 30)?),
            browser: BrowserSettings {
                chrome_path: lookup("CHROME_PATH")
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
                navigation_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "SCRAPER_BROWSER_TIMEOUT_SECS",
                    30,
                )?),
                idle_timeout: Duration::from_secs(parse_or(&lookup, "SCRAPER_IDLE_TIMEOUT_SECS", 10)?),
            },
            delay_min: Duration::from_millis(parse_or(&lookup, "SCRAPER_DELAY_MIN_MS", 2000)?),
            delay_max: Duration::from_millis(parse_or(&lookup, "SCRAPER_DELAY_MAX_MS", 4000)?),
        };

        if config.delay_min > config.delay_max {
            bail!(
                "SCRAPER_DELAY_MIN_MS ({}) must not exceed SCRAPER_DELAY_MAX_MS ({})",
                config.delay_min.as_millis(),
                config.delay_max.as_millis()
            );
        }

        Ok(config)
    }

    /// Equal bounds pin the dwell time; otherwise it is drawn from `[min, max)`.
    pub fn delay_provider(&self) -> Arc<dyn DelayProvider> {
        if self.delay_min == self.delay_max {
            Arc::new(FixedDelay(self.delay_min))
        } else {
            Arc::new(RandomDelay::new(self.delay_min, self.delay_max))
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
