//! In-memory [`Fetch`] double for pipeline tests.

use crate::collector::{Fetch, Response};
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Route {
    Page { status: u16, body: String },
    Fail,
    Hang,
}

/// Serves canned pages by exact URL. Unknown URLs fail like a refused
/// connection. Tracks how many requests were in flight at once.
#[derive(Debug, Default)]
pub(crate) struct FakeFetcher {
    routes: HashMap<String, Route>,
    delay: Duration,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            Route::Page {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    pub(crate) fn fail(mut self, url: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Fail);
        self
    }

    pub(crate) fn hang(mut self, url: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Hang);
        self
    }

    /// Delay applied to every request before it resolves.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetch for FakeFetcher {
    async fn get(&self, url: &str) -> Result<Response, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.routes.get(url).cloned() {
            Some(Route::Page { status, body }) => Ok(Response {
                url: url.to_string(),
                status,
                body: body.into_bytes(),
            }),
            Some(Route::Hang) => std::future::pending().await,
            Some(Route::Fail) | None => Err(FetchError::Transport(format!(
                "connection refused: {url}"
            ))),
        }
    }
}
