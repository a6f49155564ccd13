// src/ingest/normalize.rs
//! Per-entry normalization: date bucket, fingerprint, translated title.

use md5::{Digest, Md5};
use metrics::counter;

use crate::error::Result;
use crate::ingest::types::{Fingerprint, NormalizedRecord, RawEntry};
use crate::localtime::{day_bucket, parse_timestamp};
use crate::translate::Translator;

/// Hex MD5 of `title` immediately followed by `link`.
///
/// There is no separator, so ("ab", "c") and ("a", "bc") collide. Values
/// already stored in the filtered table were computed this way, so the
/// layout stays.
pub fn fingerprint(title: &str, link: &str) -> Fingerprint {
    let mut hasher = Md5::new();
    hasher.update(title.as_bytes());
    hasher.update(link.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Fingerprint(out)
}

/// `MM-DD` local bucket, or `""` when the timestamp cannot be read.
pub fn resolve_article_date(raw: &str) -> String {
    match parse_timestamp(raw) {
        Ok(dt) => day_bucket(&dt),
        Err(e) => {
            tracing::warn!(raw, error = %e, "timestamp unparseable, keeping entry without date");
            String::new()
        }
    }
}

pub struct EntryNormalizer<'a> {
    translator: &'a dyn Translator,
    search_timestamp: String,
}

impl<'a> EntryNormalizer<'a> {
    pub fn new(translator: &'a dyn Translator, search_timestamp: String) -> Self {
        Self {
            translator,
            search_timestamp,
        }
    }

    /// Build the row for one entry. A translation error drops the entry;
    /// a bad timestamp only blanks the date.
    pub async fn normalize(&self, entry: RawEntry) -> Result<NormalizedRecord> {
        let fp = fingerprint(&entry.title, &entry.link);
        let article_date = resolve_article_date(&entry.published);

        let literal = match self.translator.translate(&entry.title).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(title = %entry.title, error = %e, "translation failed, dropping entry");
                counter!("ingest_translation_failures_total").increment(1);
                return Err(e);
            }
        };
        // No separate rephrasing step yet.
        let natural = literal.clone();

        Ok(NormalizedRecord {
            search_timestamp: self.search_timestamp.clone(),
            article_date,
            title_original: entry.title,
            title_literal: literal,
            title_natural: natural,
            link: entry.link,
            fingerprint: fp,
        })
    }
}
