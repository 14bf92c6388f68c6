//! Channel worker: one search per channel name, one fetcher per citation.

use super::Pipeline;
use super::citation::fetch_citation;
use crate::collector::Collector;
use crate::models::{ChannelQuery, Citation, FilteredContent};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Capacity of the per-channel queue between citation fetchers and the worker.
pub(crate) const CITATION_QUEUE_CAPACITY: usize = 20;

/// Elements on the search results page holding a paste URL.
const CITATION_SELECTOR: &str = "cite";

/// Search for `query`, fetch every citation found, and forward each filtered
/// body onto `output`.
///
/// Returns once every spawned fetcher has finished and the citation queue is
/// drained. A failed or empty search forwards nothing and still returns.
#[instrument(level = "info", skip_all, fields(channel = %query.name(), window = %query.window()))]
pub(crate) async fn run_channel(
    query: ChannelQuery,
    pipeline: Pipeline,
    output: mpsc::Sender<FilteredContent>,
) {
    let link = query.search_url(&pipeline.config.search_templates);
    debug!(%link, "search url");

    let (results_tx, mut results_rx) = mpsc::channel(CITATION_QUEUE_CAPACITY);
    let mut fetchers = JoinSet::new();

    let discovered = discover_citations(&link, &pipeline, &mut fetchers, &results_tx).await;
    // Fetchers hold the remaining senders; the queue closes when the last one finishes.
    drop(results_tx);

    // Forward while joining: waiting for every fetcher before draining would
    // stall as soon as more than CITATION_QUEUE_CAPACITY results are pending.
    let mut forwarded = 0usize;
    let mut empty = 0usize;
    let mut output_open = true;
    loop {
        tokio::select! {
            Some(content) = results_rx.recv() => {
                debug!(bytes = content.len(), "forwarding citation body");
                if content.is_empty() {
                    empty += 1;
                    warn!("zero length citation body");
                }
                if output_open {
                    if output.send(content).await.is_err() {
                        warn!("result stream receiver dropped; discarding further results");
                        output_open = false;
                    } else {
                        forwarded += 1;
                    }
                }
            }
            Some(joined) = fetchers.join_next() => {
                if let Err(e) = joined {
                    error!(error = %e, "citation fetcher did not complete");
                }
            }
            else => break,
        }
    }

    info!(discovered, forwarded, empty, "channel finished");
}

/// Visit the search page, spawning one fetcher per citation element.
///
/// All spawns happen inside the `on_html` handler, which the collector runs
/// to completion before `visit` returns.
async fn discover_citations(
    link: &str,
    pipeline: &Pipeline,
    fetchers: &mut JoinSet<()>,
    results: &mpsc::Sender<FilteredContent>,
) -> usize {
    let mut discovered = 0usize;
    let mut collector = Collector::new(pipeline.fetcher.clone());

    let registered = collector.on_html(CITATION_SELECTOR, |text| {
        let citation = Citation::from_element_text(text);
        debug!(%citation, "element");
        discovered += 1;
        fetchers.spawn(fetch_citation(citation, pipeline.clone(), results.clone()));
    });
    if let Err(e) = registered {
        error!(error = %e, "could not register citation handler");
        return 0;
    }
    collector.on_error(|url, e| {
        error!(%url, error = %e, "search request failed");
    });
    collector.on_response(|response| {
        debug!(status = response.status, bytes = response.body.len(), "search response");
    });

    tokio::select! {
        _ = collector.visit(link) => {}
        _ = pipeline.cancel.cancelled() => warn!("search cancelled"),
    }
    drop(collector);

    discovered
}
