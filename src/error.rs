//! Error taxonomy for the digest pipeline.
//!
//! Every variant except `Config` and `SinkRead` is recoverable at the level
//! that produces it: a source is skipped, an entry is dropped or kept with an
//! empty date, a chunk is lost, a notification is not delivered. The binary
//! wraps fatal ones with `anyhow` context.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Transport failure, timeout or non-2xx while fetching a feed.
    #[error("source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// Feed body was fetched but is not a parseable RSS/Atom document.
    #[error("feed parse failed: {url}: {reason}")]
    FeedParse { url: String, reason: String },

    #[error("unparseable timestamp: {raw:?}")]
    TimestampUnparseable { raw: String },

    #[error("translation failed for {title:?}: {reason}")]
    TranslationFailed { title: String, reason: String },

    #[error("sink write failed on {table:?}: {reason}")]
    SinkWriteFailed { table: String, reason: String },

    #[error("sink read failed on {table:?}: {reason}")]
    SinkRead { table: String, reason: String },

    #[error("notification failed: {0}")]
    NotificationFailed(String),

    #[error("archive failed at {path:?}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;

impl DigestError {
    pub fn source_unavailable(url: &str, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn translation(title: &str, reason: impl ToString) -> Self {
        Self::TranslationFailed {
            title: title.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn sink_write(table: &str, reason: impl ToString) -> Self {
        Self::SinkWriteFailed {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn sink_read(table: &str, reason: impl ToString) -> Self {
        Self::SinkRead {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }
}
