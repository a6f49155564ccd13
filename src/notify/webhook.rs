use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use super::Notifier;
use crate::error::{DigestError, Result};
use crate::localtime::{now_local, search_timestamp};

/// Payload shape of the receiving chat service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFlavor {
    /// `{"text": ...}` (Slack and most incoming-webhook clones)
    #[default]
    Slack,
    /// `{"content": ...}`
    Discord,
}

pub struct WebhookNotifier {
    webhook_url: Option<String>,
    flavor: WebhookFlavor,
    client: Client,
    timeout: Duration,
}

impl WebhookNotifier {
    /// `None` or an empty URL disables sending.
    pub fn new(url: Option<String>) -> Self {
        Self {
            webhook_url: url.filter(|u| !u.trim().is_empty()),
            flavor: WebhookFlavor::default(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_flavor(mut self, flavor: WebhookFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("webhook disabled (no url)");
            return Ok(());
        };

        let text = format!("[{}] {}", search_timestamp(&now_local()), message);
        let body = match self.flavor {
            WebhookFlavor::Slack => serde_json::json!({ "text": text }),
            WebhookFlavor::Discord => serde_json::json!({ "content": text }),
        };

        self.client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| DigestError::NotificationFailed(format!("webhook post: {e}")))?
            .error_for_status()
            .map_err(|e| DigestError::NotificationFailed(format!("webhook non-2xx: {e}")))?;
        Ok(())
    }
}
