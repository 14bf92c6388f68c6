//! Command-line interface definitions for the IPTV scraper.
//!
//! Flags override whatever the optional YAML config file sets.

use clap::Parser;
use iptv_scraper::{RecencyWindow, ScraperConfig};

/// Command-line arguments for the IPTV scraper.
///
/// # Examples
///
/// ```sh
/// # Playlists mentioning two channels, posted in the last day
/// iptv_scraper -w D "BBC One" "Sky Sports Main Event"
///
/// # Last hour, at most four pastes downloaded at once, JSON lines on stdout
/// iptv_scraper -w last-hour --max-concurrent 4 --json "BBC One"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Channel names to search for
    pub channels: Vec<String>,

    /// How far back the search should look (H, D and W are accepted too).
    /// Required unless a config file is given.
    #[arg(
        short,
        long,
        value_enum,
        env = "IPTV_SCRAPER_WINDOW",
        required_unless_present = "config"
    )]
    pub window: Option<RecencyWindow>,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "IPTV_SCRAPER_CONFIG")]
    pub config: Option<String>,

    /// Maximum number of paste downloads in flight at once
    #[arg(long, conflicts_with = "unbounded")]
    pub max_concurrent: Option<usize>,

    /// Lift the limit on simultaneous paste downloads
    #[arg(long)]
    pub unbounded: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print one JSON object per block instead of raw playlist lines
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Layer the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut ScraperConfig) {
        if let Some(window) = self.window {
            config.window = window;
        }
        if self.unbounded {
            config.max_concurrent_fetches = None;
        } else if let Some(max) = self.max_concurrent {
            config.max_concurrent_fetches = Some(max);
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
    }
}
