// src/archive.rs
//! Weekly job: archive each sheet to CSV, then reset it to its header row.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{DigestError, Result};
use crate::notify::{notify_best_effort, Notifier};
use crate::sink::{Row, TabularStore};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub trait ArchiveWriter: Send + Sync {
    /// Persist one sheet snapshot; returns where it went.
    fn write(&self, sheet: &str, stamp: &str, header: &[String], rows: &[Row]) -> Result<PathBuf>;
}

/// `<dir>/<sheet_with_underscores>_<stamp>.csv`, UTF-8 with BOM.
pub struct CsvArchive {
    dir: PathBuf,
}

impl CsvArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, sheet: &str, stamp: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", sheet.replace(' ', "_"), stamp))
    }
}

impl ArchiveWriter for CsvArchive {
    fn write(&self, sheet: &str, stamp: &str, header: &[String], rows: &[Row]) -> Result<PathBuf> {
        let path = self.path_for(sheet, stamp);
        let fail = |e: &dyn std::fmt::Display| DigestError::Archive {
            path: path.clone(),
            reason: e.to_string(),
        };
        fs::create_dir_all(&self.dir).map_err(|e| fail(&e))?;
        let mut file = File::create(&path).map_err(|e| fail(&e))?;
        file.write_all(UTF8_BOM).map_err(|e| fail(&e))?;

        let mut w = csv::WriterBuilder::new().flexible(true).from_writer(file);
        w.write_record(header).map_err(|e| fail(&e))?;
        for r in rows {
            // Sheets drops trailing empty cells; pad back to the header width.
            let mut padded = r.clone();
            if padded.len() < header.len() {
                padded.resize(header.len(), String::new());
            }
            w.write_record(&padded).map_err(|e| fail(&e))?;
        }
        w.flush().map_err(|e| fail(&e))?;
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetOutcome {
    Archived { rows: usize, path: PathBuf },
    Skipped,
    Failed(String),
}

pub struct WeeklyReset<'a> {
    pub store: &'a dyn TabularStore,
    pub archive: &'a dyn ArchiveWriter,
    pub notifier: &'a dyn Notifier,
    pub sheets: &'a [&'a str],
}

impl WeeklyReset<'_> {
    /// Process every sheet independently; one failing sheet does not stop the rest.
    pub async fn run(&self, stamp: &str) -> Vec<(String, SheetOutcome)> {
        notify_best_effort(self.notifier, "[Weekly Reset] archive and reset starting").await;

        let mut outcomes = Vec::with_capacity(self.sheets.len());
        for sheet in self.sheets {
            let outcome = match self.reset_sheet(sheet, stamp).await {
                Ok(o) => o,
                Err(e) => {
                    tracing::error!(sheet, error = %e, "weekly reset failed for sheet");
                    SheetOutcome::Failed(e.to_string())
                }
            };
            outcomes.push((sheet.to_string(), outcome));
        }

        if let Err(e) = self.store.close().await {
            tracing::warn!(error = %e, "sink close failed");
        }
        let archived = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SheetOutcome::Archived { .. }))
            .count();
        notify_best_effort(
            self.notifier,
            &format!(
                "[Weekly Reset] done: {archived}/{} sheets archived and reset",
                self.sheets.len()
            ),
        )
        .await;
        outcomes
    }

    async fn reset_sheet(&self, sheet: &str, stamp: &str) -> Result<SheetOutcome> {
        let rows = self.store.read_rows(sheet).await?;
        let Some((header, data)) = rows.split_first() else {
            tracing::warn!(sheet, "sheet is empty, nothing to archive");
            return Ok(SheetOutcome::Skipped);
        };
        if data.is_empty() {
            tracing::warn!(sheet, "sheet has only a header, nothing to archive");
            return Ok(SheetOutcome::Skipped);
        }

        let path = self.archive.write(sheet, stamp, header, data)?;
        tracing::info!(sheet, rows = data.len(), path = %path.display(), "sheet archived");

        self.store.clear(sheet).await?;
        self.store.write_rows(sheet, &[header.clone()]).await?;
        tracing::info!(sheet, "sheet reset to header");
        Ok(SheetOutcome::Archived {
            rows: data.len(),
            path,
        })
    }
}
