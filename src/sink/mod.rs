// src/sink/mod.rs
//! Tabular store capability and the append contract on top of it.

pub mod csv_dir;
pub mod memory;
pub mod sheets;

use async_trait::async_trait;
use metrics::counter;

use crate::error::Result;
use crate::ingest::types::KnownFingerprints;

pub const ALL_NEWS: &str = "All News";
pub const FILTERED_NEWS: &str = "Filtered News";
pub const TABLES: [&str; 2] = [ALL_NEWS, FILTERED_NEWS];

pub const HEADER: [&str; 7] = [
    "search_time",
    "article_date",
    "title_original",
    "title_literal",
    "title_natural",
    "link",
    "fingerprint",
];

/// Header names under which earlier sheets stored the fingerprint column.
const FINGERPRINT_COLUMNS: [&str; 2] = ["fingerprint", "해시"];

pub const DEFAULT_BATCH_SIZE: usize = 50;

pub type Row = Vec<String>;

pub fn header_row() -> Row {
    HEADER.iter().map(|h| h.to_string()).collect()
}

#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Create the table if it does not exist yet.
    async fn ensure_table(&self, table: &str) -> Result<()>;
    async fn append_rows(&self, table: &str, rows: &[Row]) -> Result<()>;
    /// Every row, header included.
    async fn read_rows(&self, table: &str) -> Result<Vec<Row>>;
    async fn clear(&self, table: &str) -> Result<()>;
    /// Overwrite from the first cell.
    async fn write_rows(&self, table: &str, rows: &[Row]) -> Result<()>;
    /// Flush and release whatever the store holds. Idempotent.
    async fn close(&self) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Outcome of one [`BatchSink::append`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendReport {
    pub chunks: usize,
    pub chunks_failed: usize,
    pub rows_written: usize,
}

/// Appends in fixed-size chunks, in order. A failed chunk is logged and
/// skipped; later chunks are still attempted. No retries.
pub struct BatchSink<'a> {
    store: &'a dyn TabularStore,
    batch_size: usize,
}

impl<'a> BatchSink<'a> {
    pub fn new(store: &'a dyn TabularStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn append(&self, table: &str, rows: &[Row]) -> AppendReport {
        let mut report = AppendReport::default();
        for (i, chunk) in rows.chunks(self.batch_size).enumerate() {
            report.chunks += 1;
            match self.store.append_rows(table, chunk).await {
                Ok(()) => report.rows_written += chunk.len(),
                Err(e) => {
                    report.chunks_failed += 1;
                    counter!("sink_chunk_failures_total").increment(1);
                    tracing::error!(table, chunk = i, rows = chunk.len(), error = %e, "append failed");
                }
            }
        }
        report
    }
}

/// One run's use of a store: opened once, closed on every exit path.
pub struct SinkSession<'a> {
    store: &'a dyn TabularStore,
    closed: bool,
}

impl<'a> SinkSession<'a> {
    /// Make sure each table exists and starts with the header row.
    pub async fn open(store: &'a dyn TabularStore, tables: &[&str]) -> Result<SinkSession<'a>> {
        let mut session = SinkSession {
            store,
            closed: false,
        };
        if let Err(e) = session.prepare(tables).await {
            session.close().await;
            return Err(e);
        }
        tracing::debug!(store = store.name(), "sink session opened");
        Ok(session)
    }

    async fn prepare(&self, tables: &[&str]) -> Result<()> {
        for table in tables {
            self.store.ensure_table(table).await?;
            if self.store.read_rows(table).await?.is_empty() {
                self.store.write_rows(table, &[header_row()]).await?;
            }
        }
        Ok(())
    }

    pub fn store(&self) -> &'a dyn TabularStore {
        self.store
    }

    /// Snapshot of fingerprints already recorded in `table`.
    pub async fn known_fingerprints(&self, table: &str) -> Result<KnownFingerprints> {
        let rows = self.store.read_rows(table).await?;
        Ok(known_from_rows(&rows))
    }

    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.store.close().await {
            tracing::warn!(store = self.store.name(), error = %e, "sink close failed");
        }
    }
}

impl Drop for SinkSession<'_> {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(store = self.store.name(), "sink session dropped without close");
        }
    }
}

/// Pull the fingerprint column out of a table read (header first).
pub fn known_from_rows(rows: &[Row]) -> KnownFingerprints {
    let Some((header, data)) = rows.split_first() else {
        return KnownFingerprints::default();
    };
    let idx = header
        .iter()
        .position(|h| FINGERPRINT_COLUMNS.contains(&h.trim()))
        .unwrap_or(HEADER.len() - 1);
    KnownFingerprints::new(data.iter().filter_map(|r| r.get(idx)).map(|s| s.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use crate::ingest::types::Fingerprint;

    fn rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| vec![i.to_string()]).collect()
    }

    #[tokio::test]
    async fn chunks_of_fifty() {
        let store = MemoryStore::new();
        store.ensure_table(ALL_NEWS).await.unwrap();
        let report = BatchSink::new(&store, DEFAULT_BATCH_SIZE)
            .append(ALL_NEWS, &rows(120))
            .await;
        assert_eq!(report.chunks, 3);
        assert_eq!(report.rows_written, 120);
        assert_eq!(store.append_sizes(ALL_NEWS), vec![50, 50, 20]);
        let stored = store.rows(ALL_NEWS);
        assert_eq!(stored.first().unwrap()[0], "0");
        assert_eq!(stored.last().unwrap()[0], "119");
    }

    #[tokio::test]
    async fn failed_chunk_does_not_stop_later_chunks() {
        let store = MemoryStore::new().fail_append_call(1);
        store.ensure_table(ALL_NEWS).await.unwrap();
        let report = BatchSink::new(&store, 50).append(ALL_NEWS, &rows(120)).await;
        assert_eq!(report.chunks, 3);
        assert_eq!(report.chunks_failed, 1);
        assert_eq!(report.rows_written, 70);
        let stored = store.rows(ALL_NEWS);
        assert_eq!(stored.len(), 70);
        assert_eq!(stored[50][0], "100");
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let store = MemoryStore::new();
        let report = BatchSink::new(&store, 50).append(ALL_NEWS, &[]).await;
        assert_eq!(report, AppendReport::default());
        assert!(store.append_sizes(ALL_NEWS).is_empty());
    }

    #[tokio::test]
    async fn session_writes_header_once_and_closes() {
        let store = MemoryStore::new();
        let mut s = SinkSession::open(&store, &TABLES).await.unwrap();
        s.close().await;
        let mut s2 = SinkSession::open(&store, &TABLES).await.unwrap();
        s2.close().await;
        assert_eq!(store.rows(ALL_NEWS), vec![header_row()]);
        assert_eq!(store.rows(FILTERED_NEWS), vec![header_row()]);
        assert_eq!(store.close_calls(), 2);
    }

    #[test]
    fn fingerprint_column_found_by_legacy_name() {
        let rows = vec![
            vec!["검색일시".into(), "해시".into()],
            vec!["05-12 08:00".into(), "abc".into()],
            vec!["05-12 08:00".into(), "".into()],
        ];
        let known = known_from_rows(&rows);
        assert_eq!(known.len(), 1);
        assert!(known.contains(&Fingerprint("abc".into())));
    }
}
