//! reqwest-backed [`Fetch`] implementation.

use super::{Fetch, Response};
use crate::config::ScraperConfig;
use crate::error::FetchError;
use crate::utils::random_user_agent;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// HTTP fetcher presenting a randomly chosen browser identity per request.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`, if any.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder().connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self, FetchError> {
        Self::new(config.request_timeout())
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let parsed = Url::parse(url)?;
        let user_agent = random_user_agent();
        debug!(ua = user_agent, "request");

        let response = self
            .client
            .get(parsed)
            .header(USER_AGENT, user_agent)
            .send()
            .await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.bytes().await?.to_vec();

        debug!(status, bytes = body.len(), "response");
        Ok(Response {
            url: final_url,
            status,
            body,
        })
    }
}
