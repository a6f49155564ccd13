// src/ingest/fetcher.rs
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use crate::error::{DigestError, Result};
use crate::ingest::parser::{parse_feed, ParsedFeed};
use crate::ingest::types::FeedFetcher;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Plain GET per source with a hard per-request timeout.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFeedFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| DigestError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DigestError::source_unavailable(url, e))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| DigestError::source_unavailable(url, e))?;
        resp.text()
            .await
            .map_err(|e| DigestError::source_unavailable(url, e))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Serves fixed bodies by URL; unknown URLs are unavailable.
#[derive(Default)]
pub struct FixtureFetcher {
    bodies: HashMap<String, String>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl FeedFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| DigestError::source_unavailable(url, "no fixture"))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// Fetch and parse one source. Any failure is logged and reported as `None`,
/// so the caller just moves on to the next source.
pub async fn fetch_feed(fetcher: &dyn FeedFetcher, url: &str) -> Option<ParsedFeed> {
    tracing::info!(url, fetcher = fetcher.name(), "requesting feed");
    let parsed = match fetcher.fetch(url).await {
        Ok(body) => parse_feed(url, &body),
        Err(e) => Err(e),
    };
    match parsed {
        Ok(feed) => {
            tracing::debug!(url, entries = feed.len(), "feed parsed");
            Some(feed)
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "source unavailable, skipping");
            counter!("ingest_source_errors_total").increment(1);
            None
        }
    }
}
