//! # IPTV Scraper
//!
//! Discovers IPTV playlists posted on public paste sites. For every channel
//! name it runs a search restricted to a recency window, follows each cited
//! paste to its raw form, and keeps only the playlist lines of the body:
//! `#` directives and `http` locators.
//!
//! ## Usage
//!
//! ```no_run
//! use iptv_scraper::{RecencyWindow, Scraper, ScraperConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let scraper = Scraper::with_http(ScraperConfig::new(RecencyWindow::LastDay))?;
//! let mut stream = scraper.scrape_all(["BBC One", "ITV"]);
//! while let Some(block) = stream.recv().await {
//!     print!("{}", block.to_string_lossy());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Orchestration** ([`Scraper`]): one worker per channel name, all
//!    writing into a single [`ResultStream`] that closes after the last one.
//! 2. **Discovery**: each worker visits the search page through a
//!    [`Collector`] and spawns a fetcher per `<cite>` element.
//! 3. **Fetching**: each fetcher downloads the raw paste, bounded by a
//!    shared semaphore.
//! 4. **Filtering** ([`filter`]): playlist lines are kept in order, the rest dropped.
//!
//! Errors never reach the caller. They are logged through `tracing` at the
//! point they happen, and the affected channel or citation simply
//! contributes nothing.

pub mod collector;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod outputs;
pub mod scraper;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::{Collector, Fetch, HttpFetcher, Response};
pub use config::{RawPathRewrite, ScraperConfig, SearchTemplates};
pub use error::{BuildError, ConfigError, FetchError, ScanError};
pub use models::{ChannelQuery, Citation, FilteredContent, RecencyWindow};
pub use scraper::{ResultStream, Scraper};
