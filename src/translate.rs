//! Headline translation: provider abstraction plus the web translate client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DigestError, Result};

pub const DEFAULT_TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Single-string translation for a fixed language pair.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Public web translate endpoint (`client=gtx`). No key required.
pub struct GoogleWebTranslator {
    http: reqwest::Client,
    endpoint: String,
    source: String,
    target: String,
    timeout: Duration,
}

impl GoogleWebTranslator {
    pub fn new(source: &str, target: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| DigestError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: DEFAULT_TRANSLATE_ENDPOINT.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            timeout: Duration::from_secs(10),
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Translator for GoogleWebTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", self.source.as_str()),
                ("tl", self.target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DigestError::translation(text, e))?;

        if !resp.status().is_success() {
            return Err(DigestError::translation(
                text,
                format!("http status {}", resp.status()),
            ));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| DigestError::translation(text, e))?;
        join_segments(&body).ok_or_else(|| DigestError::translation(text, "empty translation"))
    }

    fn name(&self) -> &'static str {
        "google-web"
    }
}

// Response shape: [[["segment", "source", ...], ...], null, "en", ...]
fn join_segments(body: &Value) -> Option<String> {
    let segments = body.get(0)?.as_array()?;
    let joined: String = segments
        .iter()
        .filter_map(|s| s.get(0).and_then(Value::as_str))
        .collect();
    let t = joined.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Deterministic translator for tests and dry runs: prefixes the target tag,
/// fails for any text containing one of `fail_on`.
#[derive(Debug, Clone, Default)]
pub struct MockTranslator {
    pub target: String,
    pub fail_on: Vec<String>,
}

impl MockTranslator {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            fail_on: Vec::new(),
        }
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        if self.fail_on.iter().any(|n| text.contains(n.as_str())) {
            return Err(DigestError::translation(text, "mock failure"));
        }
        Ok(format!("[{}] {}", self.target, text))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
