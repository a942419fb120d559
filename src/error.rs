use thiserror::Error;

/// Hard failures of a scrape. Incomplete extraction is not an error: the
/// pipeline handles it by escalating to the browser tier.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Network(err.to_string())
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
