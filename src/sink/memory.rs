// src/sink/memory.rs
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Row, TabularStore};
use crate::error::{DigestError, Result};

#[derive(Default)]
struct Inner {
    tables: BTreeMap<String, Vec<Row>>,
    // (table, rows) per append call, failed ones included
    appends: Vec<(String, usize)>,
    closes: usize,
}

/// In-process store for tests and dry runs. Individual append calls can be
/// made to fail by their zero-based position.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_appends: HashSet<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_append_call(mut self, nth: usize) -> Self {
        self.fail_appends.insert(nth);
        self
    }

    /// Seed a table with rows (header included).
    pub fn with_table(self, table: &str, rows: Vec<Row>) -> Self {
        self.lock().tables.insert(table.to_string(), rows);
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    /// Sizes of every append call made against `table`, in call order.
    pub fn append_sizes(&self, table: &str) -> Vec<usize> {
        self.lock()
            .appends
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, n)| *n)
            .collect()
    }

    pub fn close_calls(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store mutex poisoned")
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn ensure_table(&self, table: &str) -> Result<()> {
        self.lock().tables.entry(table.to_string()).or_default();
        Ok(())
    }

    async fn append_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let mut g = self.lock();
        let call = g.appends.len();
        g.appends.push((table.to_string(), rows.len()));
        if self.fail_appends.contains(&call) {
            return Err(DigestError::sink_write(table, "injected failure"));
        }
        let t = g
            .tables
            .get_mut(table)
            .ok_or_else(|| DigestError::sink_write(table, "no such table"))?;
        t.extend_from_slice(rows);
        Ok(())
    }

    async fn read_rows(&self, table: &str) -> Result<Vec<Row>> {
        self.lock()
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| DigestError::sink_read(table, "no such table"))
    }

    async fn clear(&self, table: &str) -> Result<()> {
        match self.lock().tables.get_mut(table) {
            Some(t) => {
                t.clear();
                Ok(())
            }
            None => Err(DigestError::sink_write(table, "no such table")),
        }
    }

    async fn write_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let mut g = self.lock();
        let t = g
            .tables
            .get_mut(table)
            .ok_or_else(|| DigestError::sink_write(table, "no such table"))?;
        // Overwrite from the top, keep anything below the written range.
        for (i, row) in rows.iter().enumerate() {
            match t.get_mut(i) {
                Some(slot) => *slot = row.clone(),
                None => t.push(row.clone()),
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.lock().closes += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
