// src/runtime.rs
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::archive::{CsvArchive, SheetOutcome, WeeklyReset};
use crate::config::{AppConfig, SinkBackend};
use crate::ingest::fetcher::HttpFeedFetcher;
use crate::ingest::filter::{DateWindow, RunParams};
use crate::ingest::types::FeedFetcher;
use crate::ingest::{DailyIngest, RunSummary};
use crate::localtime::now_local;
use crate::notify::{Notifier, WebhookNotifier};
use crate::scheduler::ScheduleCfg;
use crate::sink::csv_dir::CsvDirStore;
use crate::sink::sheets::GoogleSheetsStore;
use crate::sink::{TabularStore, TABLES};
use crate::translate::{GoogleWebTranslator, Translator};

/// Every collaborator a job needs, built once from config.
pub struct DigestRuntime {
    pub cfg: AppConfig,
    pub fetcher: Box<dyn FeedFetcher>,
    pub translator: Box<dyn Translator>,
    pub store: Box<dyn TabularStore>,
    pub notifier: Box<dyn Notifier>,
    pub archive: CsvArchive,
}

impl DigestRuntime {
    pub fn from_config(cfg: AppConfig) -> Result<Self> {
        let fetcher = HttpFeedFetcher::new(&cfg.fetch.user_agent)?
            .with_timeout(Duration::from_secs(cfg.fetch.timeout_secs));
        let translator = GoogleWebTranslator::new(&cfg.translate.source, &cfg.translate.target)?
            .with_timeout(Duration::from_secs(cfg.translate.timeout_secs));
        let store = build_store(&cfg)?;
        let notifier = WebhookNotifier::new(cfg.webhook.url.clone()).with_flavor(cfg.webhook.flavor);
        let archive = CsvArchive::new(cfg.archive.dir.clone());

        // Safe diagnostics only: no token, no webhook url.
        info!(
            feeds = cfg.feeds.urls.len(),
            keywords = cfg.keywords.len(),
            store = store.name(),
            webhook = notifier.is_enabled(),
            "runtime ready"
        );
        Ok(Self {
            cfg,
            fetcher: Box::new(fetcher),
            translator: Box::new(translator),
            store,
            notifier: Box::new(notifier),
            archive,
        })
    }

    pub async fn run_daily(&self, params: &RunParams) -> Result<RunSummary> {
        let now = now_local();
        let window = DateWindow::derive(params, now)?;
        let job = DailyIngest {
            feeds: &self.cfg.feeds.urls,
            keywords: &self.cfg.keywords,
            fetcher: self.fetcher.as_ref(),
            translator: self.translator.as_ref(),
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
            batch_size: self.cfg.sink.batch_size,
        };
        job.run(&window, now).await.context("daily ingest")
    }

    pub async fn run_weekly(&self) -> Result<Vec<(String, SheetOutcome)>> {
        let stamp = now_local().format("%m-%d").to_string();
        let job = WeeklyReset {
            store: self.store.as_ref(),
            archive: &self.archive,
            notifier: self.notifier.as_ref(),
            sheets: &TABLES,
        };
        Ok(job.run(&stamp).await)
    }

    pub fn schedule(&self) -> Result<ScheduleCfg> {
        let s = &self.cfg.schedule;
        Ok(ScheduleCfg {
            daily_at: s.daily_time()?,
            weekly_on: s.weekly_day()?,
            weekly_at: s.weekly_time()?,
        })
    }
}

fn build_store(cfg: &AppConfig) -> Result<Box<dyn TabularStore>> {
    match cfg.sink.backend {
        SinkBackend::CsvDir => Ok(Box::new(CsvDirStore::new(cfg.sink.dir.clone()))),
        SinkBackend::GoogleSheets => {
            let id = cfg
                .sink
                .spreadsheet_id
                .as_deref()
                .context("sink.spreadsheet_id missing")?;
            let token = cfg.sheets_token()?;
            Ok(Box::new(GoogleSheetsStore::new(id, &token)?))
        }
    }
}
