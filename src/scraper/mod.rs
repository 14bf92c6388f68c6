//! Scrape orchestration.
//!
//! A batch fans out in two levels and fans back in to one [`ResultStream`]:
//!
//! ```text
//! Scraper::scrape_all(names)
//!   ├─ channel worker (one per name)          ── batch JoinSet, owned by the coordinator
//!   │    ├─ citation fetcher (one per <cite>) ── per-channel JoinSet
//!   │    └─ ...
//!   └─ coordinator: joins every worker, then closes the stream
//! ```
//!
//! Workers push into the shared stream; the coordinator holds the last sender
//! and drops it only after every worker has been joined, so nothing can be
//! written after the stream closes. Outbound citation fetches are gated by a
//! semaphore shared by every batch the scraper runs.
//!
//! # Cancellation
//!
//! Each batch gets its own token, a child of the scraper's token. Cancelling
//! a batch ([`ResultStream::cancellation_token`]) only winds that batch down.
//! Cancelling the scraper ([`Scraper::cancellation_token`]) is terminal: it
//! stops every running batch and every batch started afterwards closes empty.

mod channel;
mod citation;

use crate::collector::{Fetch, HttpFetcher};
use crate::config::ScraperConfig;
use crate::error::{BuildError, ConfigError};
use crate::models::{ChannelQuery, FilteredContent};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Capacity of the stream handed to the caller. Kept at one so producers
/// advance roughly in step with consumption.
const RESULT_STREAM_CAPACITY: usize = 1;

/// Handles shared by every worker and fetcher of a batch.
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub(crate) config: Arc<ScraperConfig>,
    pub(crate) fetcher: Arc<dyn Fetch>,
    pub(crate) permits: Arc<Semaphore>,
    pub(crate) cancel: CancellationToken,
}

/// Discovers playlists for a set of channel names.
///
/// Must be used from within a Tokio runtime: [`Scraper::scrape_all`] spawns
/// its workers immediately.
#[derive(Clone)]
pub struct Scraper {
    pipeline: Pipeline,
}

impl Scraper {
    /// Create a scraper fetching through `fetcher`.
    ///
    /// # Arguments
    ///
    /// * `config` - Batch settings; its recency window applies to every search
    /// * `fetcher` - Single-request capability used for searches and pastes
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `config` fails
    /// [`ScraperConfig::validate`], e.g. a concurrency bound of zero, which
    /// would leave every fetch waiting for a permit forever.
    pub fn new(config: ScraperConfig, fetcher: Arc<dyn Fetch>) -> Result<Self, ConfigError> {
        config.validate()?;
        let permits = config
            .max_concurrent_fetches
            .unwrap_or(Semaphore::MAX_PERMITS)
            .min(Semaphore::MAX_PERMITS);
        Ok(Self {
            pipeline: Pipeline {
                config: Arc::new(config),
                fetcher,
                permits: Arc::new(Semaphore::new(permits)),
                cancel: CancellationToken::new(),
            },
        })
    }

    /// Scraper backed by [`HttpFetcher`], honoring the configured timeout.
    ///
    /// # Errors
    ///
    /// Fails on an invalid `config` or when the HTTP client cannot be built.
    pub fn with_http(config: ScraperConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let fetcher = HttpFetcher::from_config(&config)?;
        Ok(Self::new(config, Arc::new(fetcher))?)
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.pipeline.config
    }

    /// Token stopping every batch of this scraper, current and future.
    ///
    /// Cancelling it is terminal for the scraper. To stop a single batch use
    /// [`ResultStream::cancellation_token`] instead.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.pipeline.cancel.clone()
    }

    /// Start one channel worker per name and return the still-open stream.
    ///
    /// # Arguments
    ///
    /// * `channels` - Channel names to search for; spaces are allowed
    ///
    /// # Returns
    ///
    /// A [`ResultStream`] yielding filtered bodies as they arrive, in no
    /// particular order. It closes once every worker has finished; an empty
    /// list of names yields a stream that closes straight away.
    ///
    /// Failures are logged, never surfaced: a channel that failed looks the
    /// same as one with no citations.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut stream = scraper.scrape_all(["BBC One", "ITV"]);
    /// while let Some(block) = stream.recv().await {
    ///     print!("{}", block.to_string_lossy());
    /// }
    /// ```
    #[instrument(level = "info", skip_all, fields(window = %self.pipeline.config.window))]
    pub fn scrape_all<I, S>(&self, channels: I) -> ResultStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.pipeline.cancel.is_cancelled() {
            warn!("Scraper was cancelled; this batch will produce no results");
        }
        let cancel = self.pipeline.cancel.child_token();
        let batch = Pipeline {
            cancel: cancel.clone(),
            ..self.pipeline.clone()
        };

        let (tx, rx) = mpsc::channel(RESULT_STREAM_CAPACITY);
        let mut workers = JoinSet::new();

        for name in channels {
            let query = ChannelQuery::new(name, batch.config.window);
            workers.spawn(channel::run_channel(query, batch.clone(), tx.clone()));
        }

        info!(channels = workers.len(), "Started channel workers");
        tokio::spawn(wait_and_close(workers, tx));

        ResultStream { rx, cancel }
    }
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("config", &self.pipeline.config)
            .field("available_permits", &self.pipeline.permits.available_permits())
            .field("cancelled", &self.pipeline.cancel.is_cancelled())
            .finish()
    }
}

/// Join every channel worker, then drop the last sender to close the stream.
async fn wait_and_close(mut workers: JoinSet<()>, tx: mpsc::Sender<FilteredContent>) {
    let expected = workers.len();
    let mut completed = 0usize;
    while let Some(joined) = workers.join_next().await {
        completed += 1;
        if let Err(e) = joined {
            error!(error = %e, "channel worker did not complete");
        }
    }
    debug!(expected, completed, "All channel workers finished; closing result stream");
    drop(tx);
}

/// Stream of filtered playlist bodies produced by one batch.
///
/// Yields `None` once the batch is complete. Dropping it early makes the
/// workers discard the rest of their results.
#[derive(Debug)]
pub struct ResultStream {
    rx: mpsc::Receiver<FilteredContent>,
    cancel: CancellationToken,
}

impl ResultStream {
    /// Next body, or `None` after the stream has closed.
    pub async fn recv(&mut self) -> Option<FilteredContent> {
        self.rx.recv().await
    }

    /// Token aborting this batch's in-flight searches and fetches.
    ///
    /// Abandoned fetches produce no result; the stream still closes through
    /// the usual join, so keep draining until `None`. Other batches of the
    /// same scraper are unaffected.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain the stream until it closes.
    pub async fn collect_all(mut self) -> Vec<FilteredContent> {
        let mut blocks = Vec::new();
        while let Some(block) = self.rx.recv().await {
            blocks.push(block);
        }
        blocks
    }
}

impl Stream for ResultStream {
    type Item = FilteredContent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchTemplates;
    use crate::models::RecencyWindow;
    use crate::testing::FakeFetcher;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::timeout;

    const SEARCH: &str = "http://search.test/?q={query}";

    fn config() -> ScraperConfig {
        ScraperConfig {
            search_templates: SearchTemplates::uniform(SEARCH),
            ..ScraperConfig::new(RecencyWindow::LastDay)
        }
    }

    fn search_url(term: &str) -> String {
        SEARCH.replace("{query}", term)
    }

    fn results_page(citations: &[&str]) -> String {
        let cites: String = citations
            .iter()
            .map(|c| format!("<div><cite>{c}</cite></div>"))
            .collect();
        format!("<html><body>{cites}</body></html>")
    }

    async fn drain(stream: ResultStream) -> Vec<String> {
        let blocks = timeout(Duration::from_secs(5), stream.collect_all())
            .await
            .expect("result stream did not close");
        let mut blocks: Vec<String> = blocks.iter().map(|b| b.to_string_lossy()).collect();
        blocks.sort();
        blocks
    }

    #[tokio::test]
    async fn test_zero_channels_closes_immediately() {
        let scraper = Scraper::new(config(), Arc::new(FakeFetcher::new())).unwrap();
        let mut stream = scraper.scrape_all(Vec::<String>::new());
        let next = timeout(Duration::from_secs(1), stream.recv()).await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_single_channel_end_to_end() {
        let fetcher = FakeFetcher::new()
            .page(
                &search_url("bbc+one"),
                200,
                &results_page(&["pastebin.com/aaa", "https://pastebin.com/bbb"]),
            )
            .page(
                "https://pastebin.com/raw/aaa",
                200,
                "foo\n#EXTM3U\nhttp://x/1.ts\nbaz\n",
            )
            .page("https://pastebin.com/raw/bbb", 200, "#EXTINF:-1,BBC One\n");
        let fetcher = Arc::new(fetcher);
        let scraper = Scraper::new(config(), fetcher.clone()).unwrap();

        let blocks = drain(scraper.scrape_all(["bbc one"])).await;

        assert_eq!(blocks, vec!["#EXTINF:-1,BBC One\n", "#EXTM3U\nhttp://x/1.ts\n"]);
        let requests = fetcher.requests();
        assert!(requests.contains(&"https://pastebin.com/raw/aaa".to_string()));
        assert!(requests.contains(&"https://pastebin.com/raw/bbb".to_string()));
    }

    #[tokio::test]
    async fn test_empty_bodies_are_forwarded() {
        let fetcher = FakeFetcher::new()
            .page(&search_url("itv"), 200, &results_page(&["pastebin.com/e"]))
            .page("https://pastebin.com/raw/e", 200, "nothing relevant\n");
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let blocks = drain(scraper.scrape_all(["itv"])).await;
        assert_eq!(blocks, vec![String::new()]);
    }

    #[tokio::test]
    async fn test_error_status_body_is_still_filtered() {
        let fetcher = FakeFetcher::new()
            .page(&search_url("itv"), 200, &results_page(&["pastebin.com/gone"]))
            .page("https://pastebin.com/raw/gone", 404, "#not-found\n");
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let blocks = drain(scraper.scrape_all(["itv"])).await;
        assert_eq!(blocks, vec!["#not-found\n"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_writes_nothing() {
        let fetcher = FakeFetcher::new()
            .page(
                &search_url("itv"),
                200,
                &results_page(&["pastebin.com/ok", "pastebin.com/broken"]),
            )
            .page("https://pastebin.com/raw/ok", 200, "#ok\n")
            .fail("https://pastebin.com/raw/broken");
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let blocks = drain(scraper.scrape_all(["itv"])).await;
        assert_eq!(blocks, vec!["#ok\n"]);
    }

    #[tokio::test]
    async fn test_failed_search_does_not_block_other_channels() {
        let fetcher = FakeFetcher::new()
            .fail(&search_url("down"))
            .page(&search_url("empty"), 200, "<html><body>no results</body></html>")
            .page(&search_url("up"), 200, &results_page(&["pastebin.com/u"]))
            .page("https://pastebin.com/raw/u", 200, "#up\n");
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let blocks = drain(scraper.scrape_all(["down", "empty", "up"])).await;
        assert_eq!(blocks, vec!["#up\n"]);
    }

    #[tokio::test]
    async fn test_many_channels_all_reported() {
        let mut fetcher = FakeFetcher::new();
        let names: Vec<String> = (0..8).map(|i| format!("ch{i}")).collect();
        for name in &names {
            fetcher = fetcher
                .page(
                    &search_url(name),
                    200,
                    &results_page(&[&format!("pastebin.com/{name}")]),
                )
                .page(
                    &format!("https://pastebin.com/raw/{name}"),
                    200,
                    &format!("#{name}\n"),
                );
        }
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let blocks = drain(scraper.scrape_all(names.clone())).await;
        let mut expected: Vec<String> = names.iter().map(|n| format!("#{n}\n")).collect();
        expected.sort();
        assert_eq!(blocks, expected);
    }

    #[tokio::test]
    async fn test_more_citations_than_queue_capacity() {
        let count = channel::CITATION_QUEUE_CAPACITY * 3;
        let ids: Vec<String> = (0..count).map(|i| format!("pastebin.com/p{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut fetcher = FakeFetcher::new().page(&search_url("big"), 200, &results_page(&refs));
        for i in 0..count {
            fetcher = fetcher.page(&format!("https://pastebin.com/raw/p{i}"), 200, "#x\n");
        }
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        // Consume slowly so the per-channel queue fills up.
        let mut stream = scraper.scrape_all(["big"]);
        let mut received = 0;
        loop {
            match timeout(Duration::from_secs(5), stream.recv()).await {
                Ok(Some(_)) => {
                    received += 1;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Ok(None) => break,
                Err(_) => panic!("pipeline stalled after {received} results"),
            }
        }
        assert_eq!(received, count);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_bounded() {
        let count = 12;
        let ids: Vec<String> = (0..count).map(|i| format!("pastebin.com/b{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut fetcher = FakeFetcher::new()
            .with_delay(Duration::from_millis(20))
            .page(&search_url("a"), 200, &results_page(&refs[..6]))
            .page(&search_url("b"), 200, &results_page(&refs[6..]));
        for i in 0..count {
            fetcher = fetcher.page(&format!("https://pastebin.com/raw/b{i}"), 200, "#b\n");
        }
        let fetcher = Arc::new(fetcher);
        let config = ScraperConfig {
            max_concurrent_fetches: Some(2),
            ..config()
        };
        let scraper = Scraper::new(config, fetcher.clone()).unwrap();

        let blocks = drain(scraper.scrape_all(["a", "b"])).await;
        assert_eq!(blocks.len(), count);
        // Two searches may overlap with two citation fetches.
        assert!(fetcher.max_in_flight() <= 4, "max in flight {}", fetcher.max_in_flight());
    }

    #[tokio::test]
    async fn test_unbounded_fetches_run_together() {
        let count = 10;
        let ids: Vec<String> = (0..count).map(|i| format!("pastebin.com/u{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut fetcher = FakeFetcher::new()
            .with_delay(Duration::from_millis(50))
            .page(&search_url("wide"), 200, &results_page(&refs));
        for i in 0..count {
            fetcher = fetcher.page(&format!("https://pastebin.com/raw/u{i}"), 200, "#u\n");
        }
        let fetcher = Arc::new(fetcher);
        let config = ScraperConfig {
            max_concurrent_fetches: None,
            ..config()
        };
        let scraper = Scraper::new(config, fetcher.clone()).unwrap();

        let blocks = drain(scraper.scrape_all(["wide"])).await;
        assert_eq!(blocks.len(), count);
        assert!(fetcher.max_in_flight() > 2, "max in flight {}", fetcher.max_in_flight());
    }

    #[tokio::test]
    async fn test_hung_fetch_blocks_until_cancelled() {
        let fetcher = FakeFetcher::new()
            .page(
                &search_url("slow"),
                200,
                &results_page(&["pastebin.com/hang", "pastebin.com/fine"]),
            )
            .hang("https://pastebin.com/raw/hang")
            .page("https://pastebin.com/raw/fine", 200, "#fine\n")
            .page(&search_url("other"), 200, &results_page(&["pastebin.com/o"]))
            .page("https://pastebin.com/raw/o", 200, "#other\n");
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let mut stream = scraper.scrape_all(["slow", "other"]);
        let cancel = stream.cancellation_token();
        let mut blocks = Vec::new();
        for _ in 0..2 {
            let block = timeout(Duration::from_secs(5), stream.recv())
                .await
                .expect("healthy results delayed by a hung fetch")
                .expect("stream closed early");
            blocks.push(block.to_string_lossy());
        }
        blocks.sort();
        assert_eq!(blocks, vec!["#fine\n", "#other\n"]);

        // The hung fetch keeps the batch open.
        assert!(timeout(Duration::from_millis(200), stream.recv()).await.is_err());

        cancel.cancel();
        let next = timeout(Duration::from_secs(5), stream.recv())
            .await
            .expect("stream did not close after cancellation");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_hung_search_closes_after_cancel() {
        let fetcher = FakeFetcher::new().hang(&search_url("stuck"));
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();
        let cancel = scraper.cancellation_token();

        let stream = scraper.scrape_all(["stuck"]);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        assert!(drain(stream).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_batch_leaves_later_batches_working() {
        let fetcher = FakeFetcher::new()
            .hang(&search_url("stuck"))
            .page(&search_url("a"), 200, &results_page(&["pastebin.com/a"]))
            .page("https://pastebin.com/raw/a", 200, "#a\n");
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let first = scraper.scrape_all(["stuck"]);
        first.cancellation_token().cancel();
        assert!(drain(first).await.is_empty());

        let second = scraper.clone().scrape_all(["a"]);
        assert_eq!(drain(second).await, vec!["#a\n"]);
    }

    #[tokio::test]
    async fn test_cancelled_scraper_stops_every_batch() {
        let fetcher = FakeFetcher::new()
            .page(&search_url("a"), 200, &results_page(&["pastebin.com/a"]))
            .page("https://pastebin.com/raw/a", 200, "#a\n");
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        scraper.cancellation_token().cancel();
        let stream = scraper.scrape_all(["a"]);
        assert!(stream.cancellation_token().is_cancelled());
        assert!(drain(stream).await.is_empty());
    }

    #[test]
    fn test_zero_concurrency_rejected_at_construction() {
        let config = ScraperConfig {
            max_concurrent_fetches: Some(0),
            ..config()
        };
        let result = Scraper::new(config, Arc::new(FakeFetcher::new()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_config_rejected_by_http_constructor() {
        let config = ScraperConfig {
            max_concurrent_fetches: Some(0),
            ..config()
        };
        let result = Scraper::with_http(config);
        assert!(matches!(result, Err(BuildError::Config(_))));
    }

    #[tokio::test]
    async fn test_scan_failure_forwards_partial_body() {
        let mut body = String::from("#ok\n");
        body.push_str(&"a".repeat(70 * 1024));
        body.push_str("\n#after\n");
        let fetcher = FakeFetcher::new()
            .page(&search_url("long"), 200, &results_page(&["pastebin.com/long"]))
            .page("https://pastebin.com/raw/long", 200, &body);
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let blocks = drain(scraper.scrape_all(["long"])).await;
        assert_eq!(blocks, vec!["#ok\n"]);
    }

    #[tokio::test]
    async fn test_stream_trait_yields_until_closed() {
        let fetcher = FakeFetcher::new()
            .page(&search_url("s"), 200, &results_page(&["pastebin.com/s"]))
            .page("https://pastebin.com/raw/s", 200, "#s\n");
        let scraper = Scraper::new(config(), Arc::new(fetcher)).unwrap();

        let blocks: Vec<FilteredContent> = scraper.scrape_all(["s"]).collect().await;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].as_bytes(), b"#s\n");
    }

    #[tokio::test]
    async fn test_http_end_to_end() {
        use crate::config::RawPathRewrite;
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let page = format!(
            "<html><body><cite>{uri}/p/one</cite><cite>{uri}/p/two</cite></body></html>",
            uri = server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Channel 5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/one"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("#EXTM3U\r\nnoise\r\nhttp://s/5.ts\r\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/two"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = ScraperConfig {
            search_templates: SearchTemplates::uniform(format!("{}/search?q={{query}}", server.uri())),
            raw_path: RawPathRewrite {
                from: "/p/".to_string(),
                to: "/raw/".to_string(),
            },
            request_timeout_secs: Some(5),
            ..ScraperConfig::new(RecencyWindow::LastHour)
        };
        let scraper = Scraper::with_http(config).unwrap();

        let blocks = drain(scraper.scrape_all(["Channel 5"])).await;
        assert_eq!(blocks, vec![String::new(), "#EXTM3U\nhttp://s/5.ts\n".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_stream_does_not_wedge_workers() {
        let fetcher = FakeFetcher::new()
            .page(
                &search_url("d"),
                200,
                &results_page(&["pastebin.com/d1", "pastebin.com/d2", "pastebin.com/d3"]),
            )
            .page("https://pastebin.com/raw/d1", 200, "#1\n")
            .page("https://pastebin.com/raw/d2", 200, "#2\n")
            .page("https://pastebin.com/raw/d3", 200, "#3\n");
        let fetcher = Arc::new(fetcher);
        let scraper = Scraper::new(config(), fetcher.clone()).unwrap();

        drop(scraper.scrape_all(["d"]));
        // Workers keep fetching and discard results instead of blocking forever.
        timeout(Duration::from_secs(5), async {
            while fetcher.requests().len() < 4 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
