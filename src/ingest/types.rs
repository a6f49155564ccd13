// src/ingest/types.rs
use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One feed item as parsed, before any normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    /// `published`, else `updated`, else empty.
    pub published: String,
}

/// Hex digest over `title + link`. The only dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub search_timestamp: String,
    /// `MM-DD` in local time, or empty when the timestamp did not parse.
    pub article_date: String,
    pub title_original: String,
    pub title_literal: String,
    /// Currently a copy of `title_literal`.
    pub title_natural: String,
    pub link: String,
    pub fingerprint: Fingerprint,
}

impl NormalizedRecord {
    /// Column order matches [`crate::sink::HEADER`].
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.search_timestamp.clone(),
            self.article_date.clone(),
            self.title_original.clone(),
            self.title_literal.clone(),
            self.title_natural.clone(),
            self.link.clone(),
            self.fingerprint.0.clone(),
        ]
    }
}

/// Fingerprints already present in the filtered table when the run started.
/// Never updated during a run.
#[derive(Debug, Clone, Default)]
pub struct KnownFingerprints(HashSet<String>);

impl KnownFingerprints {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            items
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.0.contains(fp.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Retrieves the raw body of one feed source.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}
