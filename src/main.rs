//! # IPTV Scraper CLI
//!
//! Searches paste sites for playlists mentioning the given channel names and
//! prints the playlist lines of every paste found.
//!
//! ## Usage
//!
//! ```sh
//! iptv_scraper -w last-day "BBC One" "ITV" > playlists.m3u
//! RUST_LOG=iptv_scraper=debug iptv_scraper --json "Sky Sports"
//! ```
//!
//! Results go to stdout as they arrive; logs go to stderr. Ctrl-C cancels
//! every in-flight request and lets the batch wind down cleanly.

use clap::Parser;
use iptv_scraper::outputs::{BlockWriter, OutputFormat};
use iptv_scraper::{Scraper, ScraperConfig};
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration: file first, flags on top ----
    let mut config = match &args.config {
        Some(path) => ScraperConfig::load(path).inspect_err(|e| {
            error!(%path, error = %e, "Failed to load configuration");
        })?,
        None => ScraperConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;
    info!(
        window = %config.window,
        max_concurrent_fetches = ?config.max_concurrent_fetches,
        request_timeout_secs = ?config.request_timeout_secs,
        channels = args.channels.len(),
        "iptv_scraper starting up"
    );
    if args.channels.is_empty() {
        warn!("No channel names given; nothing to search for");
    }

    let scraper = Scraper::with_http(config)?;

    let cancel = scraper.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling in-flight requests");
            cancel.cancel();
        }
    });

    // ---- Drain results ----
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };
    let mut writer = BlockWriter::new(tokio::io::stdout(), format);
    let mut stream = scraper.scrape_all(args.channels.iter().cloned());
    let mut empty = 0usize;
    while let Some(block) = stream.recv().await {
        if block.is_empty() {
            empty += 1;
        }
        if let Err(e) = writer.write(&block).await {
            error!(error = %e, "Failed writing block to stdout");
            return Err(e.into());
        }
    }
    let blocks = writer.received();

    let elapsed = start_time.elapsed();
    info!(
        blocks,
        empty,
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
