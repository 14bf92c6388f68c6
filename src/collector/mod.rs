//! Fetching and parsing collaborator.
//!
//! The pipeline never talks to the network directly. It goes through two layers:
//!
//! - [`Fetch`]: a single-request capability (`GET url -> Response`). The
//!   production implementation is [`HttpFetcher`]; tests substitute their own.
//! - [`Collector`]: a callback-driven visitor on top of a `Fetch`. Handlers are
//!   registered with [`Collector::on_html`], [`Collector::on_error`] and
//!   [`Collector::on_response`], then [`Collector::visit`] performs the request
//!   and dispatches them.
//!
//! # Dispatch ordering
//!
//! `visit` fires every matching `on_html` handler synchronously, in document
//! order, before it returns. Channel workers rely on this: they spawn one
//! fetcher per citation from inside the handler and only start waiting on
//! those fetchers once `visit` has returned, so every spawn is registered
//! before the wait begins.

mod http;

pub use http::HttpFetcher;

use crate::error::FetchError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A completed HTTP exchange. Any status code counts as completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

/// Single-request capability used by collectors and citation fetchers.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str) -> Result<Response, FetchError>;
}

type HtmlHandler<'a> = Box<dyn FnMut(&str) + Send + 'a>;
type ErrorHandler<'a> = Box<dyn FnMut(&str, &FetchError) + Send + 'a>;
type ResponseHandler<'a> = Box<dyn FnMut(&Response) + Send + 'a>;

/// Callback-driven page visitor.
///
/// Handlers may borrow from the caller's stack for `'a`, which lets a channel
/// worker spawn straight into its own join set from an `on_html` handler.
pub struct Collector<'a> {
    fetcher: Arc<dyn Fetch>,
    html_handlers: Vec<(Selector, HtmlHandler<'a>)>,
    error_handlers: Vec<ErrorHandler<'a>>,
    response_handlers: Vec<ResponseHandler<'a>>,
}

impl<'a> Collector<'a> {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            html_handlers: Vec::new(),
            error_handlers: Vec::new(),
            response_handlers: Vec::new(),
        }
    }

    /// Register `handler` to receive the text content of every element
    /// matching the CSS `selector`.
    pub fn on_html<F>(&mut self, selector: &str, handler: F) -> Result<(), FetchError>
    where
        F: FnMut(&str) + Send + 'a,
    {
        let selector =
            Selector::parse(selector).map_err(|e| FetchError::Selector(e.to_string()))?;
        self.html_handlers.push((selector, Box::new(handler)));
        Ok(())
    }

    /// Register `handler` for transport failures. Receives the requested URL.
    pub fn on_error<F>(&mut self, handler: F)
    where
        F: FnMut(&str, &FetchError) + Send + 'a,
    {
        self.error_handlers.push(Box::new(handler));
    }

    /// Register `handler` for every completed response, before HTML dispatch.
    pub fn on_response<F>(&mut self, handler: F)
    where
        F: FnMut(&Response) + Send + 'a,
    {
        self.response_handlers.push(Box::new(handler));
    }

    /// Fetch `url` and dispatch the registered handlers.
    ///
    /// On failure the error handlers run and the error is returned; no
    /// response or HTML handler fires. On success all HTML handlers have run
    /// to completion by the time this returns.
    pub async fn visit(&mut self, url: &str) -> Result<(), FetchError> {
        let response = match self.fetcher.get(url).await {
            Ok(response) => response,
            Err(e) => {
                for handler in self.error_handlers.iter_mut() {
                    handler(url, &e);
                }
                return Err(e);
            }
        };

        for handler in self.response_handlers.iter_mut() {
            handler(&response);
        }
        self.dispatch_html(&response);
        Ok(())
    }

    fn dispatch_html(&mut self, response: &Response) {
        if self.html_handlers.is_empty() {
            return;
        }
        let html = String::from_utf8_lossy(&response.body);
        let document = Html::parse_document(&html);
        for (selector, handler) in self.html_handlers.iter_mut() {
            let mut matched = 0usize;
            for element in document.select(selector) {
                let text = element.text().collect::<String>();
                handler(&text);
                matched += 1;
            }
            debug!(url = %response.url, matched, "Dispatched HTML handler");
        }
    }
}

impl fmt::Debug for Collector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("html_handlers", &self.html_handlers.len())
            .field("error_handlers", &self.error_handlers.len())
            .field("response_handlers", &self.response_handlers.len())
            .finish()
    }
}
