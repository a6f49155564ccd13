// src/ingest/filter.rs
use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};

use crate::error::{DigestError, Result};
use crate::ingest::types::{KnownFingerprints, NormalizedRecord};
use crate::localtime::to_local;

// Leap year, so 02-29 is a valid bucket.
const BUCKET_YEAR: i32 = 2000;

/// Which article dates to select. First populated mode wins:
/// `date`, then `from_date` + `to_date`, then yesterday.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunParams {
    pub date: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

/// Set of `MM-DD` buckets eligible for the filtered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow(BTreeSet<String>);

impl DateWindow {
    pub fn derive(params: &RunParams, now: DateTime<FixedOffset>) -> Result<Self> {
        if let Some(d) = &params.date {
            let day = parse_bucket(d)?;
            return Ok(Self(BTreeSet::from([fmt_bucket(day)])));
        }
        match (&params.from_date, &params.to_date) {
            (Some(from), Some(to)) => {
                let start = parse_bucket(from)?;
                let end = parse_bucket(to)?;
                if end < start {
                    tracing::warn!(%from, %to, "date range ends before it starts; window is empty");
                }
                let mut set = BTreeSet::new();
                let mut day = start;
                while day <= end {
                    set.insert(fmt_bucket(day));
                    day += Duration::days(1);
                }
                Ok(Self(set))
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("only one end of the date range given; using yesterday");
                Ok(Self::yesterday(now))
            }
            (None, None) => Ok(Self::yesterday(now)),
        }
    }

    /// The local calendar day before `now`.
    pub fn yesterday(now: DateTime<FixedOffset>) -> Self {
        let y = to_local(now) - Duration::days(1);
        Self(BTreeSet::from([y.format("%m-%d").to_string()]))
    }

    pub fn contains(&self, bucket: &str) -> bool {
        self.0.contains(bucket)
    }

    pub fn buckets(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_bucket(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{BUCKET_YEAR}-{}", s.trim()), "%Y-%m-%d")
        .map_err(|e| DigestError::Config(format!("invalid MM-DD date {s:?}: {e}")))
}

fn fmt_bucket(d: NaiveDate) -> String {
    d.format("%m-%d").to_string()
}

/// Lowercase, trim and drop empty keywords once so matching can compare directly.
pub fn prepare_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Case-insensitive substring match of any keyword. Keywords must already
/// be lowercased (see [`prepare_keywords`]).
pub fn matches_keyword(title: &str, keywords: &[String]) -> bool {
    let t = title.to_lowercase();
    keywords.iter().any(|k| t.contains(k.as_str()))
}

/// Gate for the filtered output stream.
pub struct DedupFilter<'a> {
    window: &'a DateWindow,
    keywords: &'a [String],
    known: &'a KnownFingerprints,
}

impl<'a> DedupFilter<'a> {
    pub fn new(window: &'a DateWindow, keywords: &'a [String], known: &'a KnownFingerprints) -> Self {
        Self {
            window,
            keywords,
            known,
        }
    }

    /// In the window, matches a keyword, and not already recorded.
    pub fn admits(&self, rec: &NormalizedRecord) -> bool {
        self.window.contains(&rec.article_date)
            && matches_keyword(&rec.title_original, self.keywords)
            && !self.known.contains(&rec.fingerprint)
    }
}
