// src/ingest/mod.rs
pub mod fetcher;
pub mod filter;
pub mod normalize;
pub mod parser;
pub mod types;

use std::fmt;

use chrono::{DateTime, FixedOffset};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

use crate::error::Result;
use crate::ingest::fetcher::fetch_feed;
use crate::ingest::filter::{DateWindow, DedupFilter};
use crate::ingest::normalize::EntryNormalizer;
use crate::ingest::parser::ParsedFeed;
use crate::ingest::types::{FeedFetcher, NormalizedRecord};
use crate::localtime::search_timestamp;
use crate::notify::{notify_best_effort, Notifier};
use crate::sink::{BatchSink, Row, SinkSession, TabularStore, ALL_NEWS, FILTERED_NEWS, TABLES};
use crate::translate::Translator;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_entries_total", "Entries parsed from feeds.");
        describe_counter!(
            "ingest_source_errors_total",
            "Feed sources that could not be fetched or parsed."
        );
        describe_counter!(
            "ingest_translation_failures_total",
            "Entries dropped because translation failed."
        );
        describe_counter!("ingest_all_rows_total", "Rows sent to the all-entries table.");
        describe_counter!(
            "ingest_filtered_rows_total",
            "Rows sent to the filtered table."
        );
        describe_counter!("sink_chunk_failures_total", "Append chunks that failed.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Linear progression of a daily run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Start,
    Fetching,
    Normalizing,
    Filtering,
    Writing,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Start => "start",
            RunStage::Fetching => "fetching",
            RunStage::Normalizing => "normalizing",
            RunStage::Filtering => "filtering",
            RunStage::Writing => "writing",
            RunStage::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: usize,
    pub sources_failed: usize,
    pub entries_seen: usize,
    pub translation_failures: usize,
    pub all_rows: usize,
    pub filtered_rows: usize,
    pub chunks_failed: usize,
}

impl RunSummary {
    pub fn message(&self) -> String {
        format!(
            "[Daily Fetch] saved {} filtered of {} total entries ({} of {} sources failed, {} untranslated)",
            self.filtered_rows,
            self.all_rows,
            self.sources_failed,
            self.sources,
            self.translation_failures
        )
    }
}

/// Collaborators and settings for one daily ingest.
pub struct DailyIngest<'a> {
    pub feeds: &'a [String],
    /// Already lowercased; see [`filter::prepare_keywords`].
    pub keywords: &'a [String],
    pub fetcher: &'a dyn FeedFetcher,
    pub translator: &'a dyn Translator,
    pub store: &'a dyn TabularStore,
    pub notifier: &'a dyn Notifier,
    pub batch_size: usize,
}

impl DailyIngest<'_> {
    /// Run once for `window`, with `now` as the run's local start time.
    ///
    /// Only an unreadable sink aborts; every other failure is absorbed
    /// and counted in the summary.
    pub async fn run(&self, window: &DateWindow, now: DateTime<FixedOffset>) -> Result<RunSummary> {
        ensure_metrics_described();
        stage(RunStage::Start);
        notify_best_effort(self.notifier, "[Daily Fetch] news collection starting").await;

        let mut session = SinkSession::open(self.store, &TABLES).await?;
        let result = self.run_in_session(&session, window, now).await;
        session.close().await;
        let summary = result?;

        stage(RunStage::Done);
        tracing::info!(
            sources = summary.sources,
            sources_failed = summary.sources_failed,
            entries = summary.entries_seen,
            all_rows = summary.all_rows,
            filtered_rows = summary.filtered_rows,
            "daily run finished"
        );
        notify_best_effort(self.notifier, &summary.message()).await;
        Ok(summary)
    }

    async fn run_in_session(
        &self,
        session: &SinkSession<'_>,
        window: &DateWindow,
        now: DateTime<FixedOffset>,
    ) -> Result<RunSummary> {
        // Read once, before any write of this run.
        let known = session.known_fingerprints(FILTERED_NEWS).await?;
        tracing::info!(known = known.len(), window = ?window.buckets().collect::<Vec<_>>(), "run parameters");

        let mut summary = RunSummary {
            sources: self.feeds.len(),
            ..Default::default()
        };

        stage(RunStage::Fetching);
        let mut feeds: Vec<ParsedFeed> = Vec::with_capacity(self.feeds.len());
        for url in self.feeds {
            match fetch_feed(self.fetcher, url).await {
                Some(feed) => feeds.push(feed),
                None => summary.sources_failed += 1,
            }
        }

        stage(RunStage::Normalizing);
        let normalizer = EntryNormalizer::new(self.translator, search_timestamp(&now));
        let mut records: Vec<NormalizedRecord> = Vec::new();
        for entry in feeds.into_iter().flatten() {
            summary.entries_seen += 1;
            match normalizer.normalize(entry).await {
                Ok(rec) => records.push(rec),
                Err(_) => summary.translation_failures += 1,
            }
        }

        stage(RunStage::Filtering);
        let gate = DedupFilter::new(window, self.keywords, &known);
        let all_rows: Vec<Row> = records.iter().map(NormalizedRecord::to_row).collect();
        let filtered_rows: Vec<Row> = records
            .iter()
            .filter(|r| gate.admits(r))
            .map(NormalizedRecord::to_row)
            .collect();

        stage(RunStage::Writing);
        let sink = BatchSink::new(session.store(), self.batch_size);
        summary.all_rows = all_rows.len();
        summary.filtered_rows = filtered_rows.len();
        for (table, rows) in [(ALL_NEWS, &all_rows), (FILTERED_NEWS, &filtered_rows)] {
            if rows.is_empty() {
                tracing::warn!(table, "no rows to save");
                continue;
            }
            let report = sink.append(table, rows).await;
            summary.chunks_failed += report.chunks_failed;
            tracing::info!(table, rows = report.rows_written, failed_chunks = report.chunks_failed, "rows saved");
        }
        counter!("ingest_all_rows_total").increment(all_rows.len() as u64);
        counter!("ingest_filtered_rows_total").increment(filtered_rows.len() as u64);

        Ok(summary)
    }
}

fn stage(s: RunStage) {
    tracing::debug!(stage = %s, "daily run stage");
}
