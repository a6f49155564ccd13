// src/notify/mod.rs
pub mod webhook;

use std::sync::Mutex;

use crate::error::Result;

pub use webhook::{WebhookFlavor, WebhookNotifier};

/// Fire-and-forget text channel for run start/summary messages.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Send and swallow: delivery problems are logged, never returned.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.send(message).await {
        tracing::warn!(error = %e, "notification not delivered");
    }
}

/// Keeps every message in memory. Test helper.
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .push(message.to_string());
        Ok(())
    }
}
