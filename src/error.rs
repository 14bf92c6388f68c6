//! Error types shared across the scraping pipeline.
//!
//! None of these ever reach the caller of [`Scraper::scrape_all`](crate::Scraper::scrape_all):
//! workers and fetchers log them where they happen and carry on. They exist so
//! the individual building blocks (the line filter, the collector, config
//! loading) can be used and tested on their own.

use crate::models::FilteredContent;
use thiserror::Error;

/// Errors raised while fetching a page through a [`Fetch`](crate::collector::Fetch) implementation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, TLS, timeout, body read)
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Transport failure reported by a non-reqwest [`Fetch`](crate::collector::Fetch) implementation
    #[error("Transport error: {0}")]
    Transport(String),
    /// The URL could not be parsed before issuing the request
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// A CSS selector registered on a collector did not parse
    #[error("Invalid selector: {0}")]
    Selector(String),
    /// The batch was cancelled while the request was in flight
    #[error("Request cancelled")]
    Cancelled,
}

/// The line filter stopped before reaching the end of its input.
///
/// Every variant keeps whatever was accumulated before the failure so the
/// caller can still forward the partial output.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A single line exceeded the scanner's maximum line length
    #[error("Line exceeds {limit} bytes")]
    LineTooLong {
        limit: usize,
        partial: FilteredContent,
    },
    /// The underlying reader failed
    #[error("Error while scanning: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        partial: FilteredContent,
    },
}

impl ScanError {
    /// Consume the error, keeping the lines filtered before the failure.
    pub fn into_partial(self) -> FilteredContent {
        match self {
            ScanError::LineTooLong { partial, .. } | ScanError::Io { partial, .. } => partial,
        }
    }
}

/// Errors raised while loading or validating a [`ScraperConfig`](crate::ScraperConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while constructing a [`Scraper`](crate::Scraper).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] FetchError),
}
