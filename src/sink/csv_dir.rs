// src/sink/csv_dir.rs
//! One CSV file per table under a directory. Handy for local runs without
//! spreadsheet credentials.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Row, TabularStore};
use crate::error::{DigestError, Result};

pub struct CsvDirStore {
    dir: PathBuf,
}

impl CsvDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table.replace(' ', "_")))
    }

    fn write_all(path: &Path, rows: &[Row], append: bool) -> std::io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        let mut w = csv::WriterBuilder::new().flexible(true).from_writer(file);
        for r in rows {
            w.write_record(r)?;
        }
        w.flush()
    }
}

#[async_trait]
impl TabularStore for CsvDirStore {
    async fn ensure_table(&self, table: &str) -> Result<()> {
        let path = self.table_path(table);
        if path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)
            .and_then(|_| Self::write_all(&path, &[], true))
            .map_err(|e| DigestError::sink_write(table, e))
    }

    async fn append_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let path = self.table_path(table);
        if !path.exists() {
            return Err(DigestError::sink_write(table, "no such table"));
        }
        Self::write_all(&path, rows, true).map_err(|e| DigestError::sink_write(table, e))
    }

    async fn read_rows(&self, table: &str) -> Result<Vec<Row>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(self.table_path(table))
            .map_err(|e| DigestError::sink_read(table, e))?;
        rdr.records()
            .map(|rec| {
                rec.map(|r| r.iter().map(str::to_string).collect::<Row>())
                    .map_err(|e| DigestError::sink_read(table, e))
            })
            .collect()
    }

    async fn clear(&self, table: &str) -> Result<()> {
        Self::write_all(&self.table_path(table), &[], false)
            .map_err(|e| DigestError::sink_write(table, e))
    }

    async fn write_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let mut existing = self.read_rows(table).await?;
        for (i, row) in rows.iter().enumerate() {
            match existing.get_mut(i) {
                Some(slot) => *slot = row.clone(),
                None => existing.push(row.clone()),
            }
        }
        Self::write_all(&self.table_path(table), &existing, false)
            .map_err(|e| DigestError::sink_write(table, e))
    }

    async fn close(&self) -> Result<()> {
        // Every write is flushed as it happens.
        Ok(())
    }

    fn name(&self) -> &'static str {
        "csv_dir"
    }
}
