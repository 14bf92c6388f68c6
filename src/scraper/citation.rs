//! Citation fetcher: one task per discovered paste.

use super::Pipeline;
use crate::error::FetchError;
use crate::filter::filter_bytes;
use crate::models::{Citation, FilteredContent};
use crate::utils::truncate_for_log;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, warn};

/// Fetch the raw form of `citation`, filter it, and queue the result.
///
/// Writes at most one value to `results`: the filtered body (possibly empty)
/// when a response arrives, nothing on transport failure or cancellation.
/// Completion is signalled by the task finishing, which the owning channel
/// worker observes through its join set.
#[instrument(level = "debug", skip_all, fields(citation = %citation))]
pub(crate) async fn fetch_citation(
    citation: Citation,
    pipeline: Pipeline,
    results: mpsc::Sender<FilteredContent>,
) {
    let permit = tokio::select! {
        permit = pipeline.permits.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "fetch permits closed");
                return;
            }
        },
        _ = pipeline.cancel.cancelled() => {
            debug!("cancelled while waiting for a fetch slot");
            return;
        }
    };

    let url = citation.raw_url(&pipeline.config.raw_path);
    debug!(%url, "raw url");

    let outcome = tokio::select! {
        outcome = pipeline.fetcher.get(&url) => outcome,
        _ = pipeline.cancel.cancelled() => Err(FetchError::Cancelled),
    };
    drop(permit);

    let response = match outcome {
        Ok(response) => response,
        Err(FetchError::Cancelled) => {
            warn!(%url, "citation fetch cancelled");
            return;
        }
        Err(e) => {
            error!(%url, error = %e, "citation fetch failed");
            return;
        }
    };
    debug!(status = response.status, "response");

    let content = match filter_bytes(&response.body) {
        Ok(content) => content,
        Err(e) => {
            error!(error = %e, "scan error");
            e.into_partial()
        }
    };
    debug!(
        bytes = content.len(),
        preview = %truncate_for_log(&content.to_string_lossy(), 120),
        "filtered citation body"
    );

    if results.send(content).await.is_err() {
        warn!("citation queue closed before result could be queued");
    }
}
