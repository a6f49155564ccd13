// src/config/mod.rs
//! Runtime configuration, loaded once at startup and handed to the jobs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;

use crate::ingest::fetcher::DEFAULT_FETCH_TIMEOUT_SECS;
use crate::ingest::filter::prepare_keywords;
use crate::notify::WebhookFlavor;
use crate::sink::DEFAULT_BATCH_SIZE;

pub const ENV_CONFIG_PATH: &str = "NEWS_DIGEST_CONFIG";
pub const ENV_SHEETS_TOKEN: &str = "GOOGLE_SHEETS_TOKEN";
pub const DEFAULT_TOML_PATH: &str = "config/news_digest.toml";
pub const DEFAULT_JSON_PATH: &str = "config/news_digest.json";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub urls: Vec<String>,
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkBackend {
    GoogleSheets,
    #[default]
    CsvDir,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_sink_dir() -> PathBuf {
    PathBuf::from("sheets")
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub backend: SinkBackend,
    pub spreadsheet_id: Option<String>,
    /// Bearer token, or "ENV" to read `GOOGLE_SHEETS_TOKEN`.
    pub access_token: Option<String>,
    #[serde(default = "default_sink_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            backend: SinkBackend::default(),
            spreadsheet_id: None,
            access_token: None,
            dir: default_sink_dir(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_source_lang() -> String {
    "en".into()
}
fn default_target_lang() -> String {
    "ko".into()
}
fn default_translate_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateConfig {
    #[serde(default = "default_source_lang")]
    pub source: String,
    #[serde(default = "default_target_lang")]
    pub target: String,
    #[serde(default = "default_translate_timeout")]
    pub timeout_secs: u64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            source: default_source_lang(),
            target: default_target_lang(),
            timeout_secs: default_translate_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    pub url: Option<String>,
    #[serde(default)]
    pub flavor: WebhookFlavor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("backups")
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

fn default_daily_at() -> String {
    "08:00".into()
}
fn default_weekly_on() -> String {
    "Mon".into()
}
fn default_weekly_at() -> String {
    "07:00".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
    #[serde(default = "default_weekly_on")]
    pub weekly_on: String,
    #[serde(default = "default_weekly_at")]
    pub weekly_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: default_daily_at(),
            weekly_on: default_weekly_on(),
            weekly_at: default_weekly_at(),
        }
    }
}

impl ScheduleConfig {
    pub fn daily_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.daily_at)
    }

    pub fn weekly_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.weekly_at)
    }

    pub fn weekly_day(&self) -> Result<Weekday> {
        self.weekly_on
            .trim()
            .parse::<Weekday>()
            .map_err(|_| anyhow!("invalid weekday {:?}", self.weekly_on))
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").with_context(|| format!("invalid HH:MM {s:?}"))
}

impl AppConfig {
    /// Spreadsheet token with "ENV" resolved.
    pub fn sheets_token(&self) -> Result<String> {
        let raw = self
            .sink
            .access_token
            .as_deref()
            .ok_or_else(|| anyhow!("sink.access_token is required for google_sheets"))?;
        if raw.trim().eq_ignore_ascii_case("env") {
            return std::env::var(ENV_SHEETS_TOKEN)
                .map_err(|_| anyhow!("Missing {ENV_SHEETS_TOKEN} env var"));
        }
        Ok(raw.to_string())
    }

    fn validate(mut self) -> Result<Self> {
        if self.sink.batch_size == 0 {
            bail!("sink.batch_size must be at least 1");
        }
        if self.sink.backend == SinkBackend::GoogleSheets && self.sink.spreadsheet_id.is_none() {
            bail!("sink.spreadsheet_id is required for google_sheets");
        }
        self.schedule.daily_time()?;
        self.schedule.weekly_time()?;
        self.schedule.weekly_day()?;

        self.keywords = prepare_keywords(&self.keywords);
        self.feeds.urls = self
            .feeds
            .urls
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if self.feeds.urls.is_empty() {
            tracing::warn!("no feed urls configured");
        }
        Ok(self)
    }
}

/// Load from an explicit path. TOML or JSON, picked by extension.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg: AppConfig = match ext.as_str() {
        "json" => serde_json::from_str(&content).context("parsing json config")?,
        _ => toml::from_str(&content).context("parsing toml config")?,
    };
    cfg.validate()
}

/// Resolution order:
/// 1) `explicit` (from the command line)
/// 2) $NEWS_DIGEST_CONFIG
/// 3) config/news_digest.toml
/// 4) config/news_digest.json
pub fn load(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(p) = explicit {
        return load_from(p);
    }
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path");
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_from(&p);
        }
    }
    Err(anyhow!(
        "no config found (tried {DEFAULT_TOML_PATH}, {DEFAULT_JSON_PATH})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    const SAMPLE: &str = r#"
keywords = [" Chip ", "", "Tariff"]

[feeds]
urls = ["https://a.test/rss", "  "]

[sink]
backend = "google_sheets"
spreadsheet_id = "sheet-1"
access_token = "ENV"

[webhook]
url = "https://hooks.test/x"
flavor = "discord"
"#;

    #[test]
    fn toml_defaults_and_cleanup() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        let cfg = cfg.validate().unwrap();
        assert_eq!(cfg.keywords, vec!["chip".to_string(), "tariff".to_string()]);
        assert_eq!(cfg.feeds.urls, vec!["https://a.test/rss".to_string()]);
        assert_eq!(cfg.sink.batch_size, 50);
        assert_eq!(cfg.fetch.timeout_secs, 10);
        assert_eq!(cfg.translate.target, "ko");
        assert_eq!(cfg.webhook.flavor, WebhookFlavor::Discord);
        assert_eq!(cfg.schedule.weekly_day().unwrap(), Weekday::Mon);
    }

    #[test]
    fn zero_batch_and_bad_times_are_rejected() {
        let cfg: AppConfig = toml::from_str("[sink]\nbatch_size = 0").unwrap();
        assert!(cfg.validate().is_err());
        let cfg: AppConfig = toml::from_str("[schedule]\ndaily_at = \"25:99\"").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sheets_backend_needs_spreadsheet_id() {
        let cfg: AppConfig = toml::from_str("[sink]\nbackend = \"google_sheets\"").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn token_env_indirection() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        env::set_var(ENV_SHEETS_TOKEN, "tok-123");
        assert_eq!(cfg.sheets_token().unwrap(), "tok-123");
        env::remove_var(ENV_SHEETS_TOKEN);
        assert!(cfg.sheets_token().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn load_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        assert!(load(None).is_err());

        fs::create_dir_all("config").unwrap();
        fs::write(DEFAULT_JSON_PATH, r#"{"keywords": ["X"]}"#).unwrap();
        assert_eq!(load(None).unwrap().keywords, vec!["x".to_string()]);

        let p_env = tmp.path().join("other.toml");
        fs::write(&p_env, r#"keywords = ["Y"]"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
        assert_eq!(load(None).unwrap().keywords, vec!["y".to_string()]);
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
