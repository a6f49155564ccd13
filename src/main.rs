//! news-digest: daily feed ingest, weekly archive, or both on a schedule.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_digest::archive::SheetOutcome;
use news_digest::config;
use news_digest::scheduler::{self, Job};
use news_digest::{DigestRuntime, RunParams};

#[derive(Parser, Debug)]
#[command(name = "news-digest", version, about = "Collect, translate and file news headlines")]
struct Cli {
    /// Config file (TOML or JSON). Falls back to $NEWS_DIGEST_CONFIG, then config/news_digest.{toml,json}.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, translate, filter and store once.
    Daily {
        /// Single MM-DD bucket; wins over the range.
        #[arg(long)]
        date: Option<String>,
        #[arg(long = "from-date", alias = "from_date")]
        from_date: Option<String>,
        #[arg(long = "to-date", alias = "to_date")]
        to_date: Option<String>,
    },
    /// Archive every table to CSV and reset it to its header.
    Weekly,
    /// Run both jobs forever at the configured times.
    Schedule,
}

impl Command {
    fn log_name(&self) -> &'static str {
        match self {
            Command::Daily { .. } => "daily_fetch",
            Command::Weekly => "weekly_reset",
            Command::Schedule => "schedule",
        }
    }
}

/// stdout plus `<dir>/<job>.log` when a dir is given and writable.
fn init_tracing(log_dir: Option<&Path>, job: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file = log_dir.and_then(|dir| {
        fs::create_dir_all(dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{job}.log")))
            .ok()
    });
    let file_layer = file.map(|f| fmt::layer().with_ansi(false).with_writer(Mutex::new(f)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(file_layer)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let job = cli.command.log_name();

    let cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(None, job);
            tracing::error!(error = ?e, "config load failed");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(Some(&cfg.logging.dir), job);

    match run(cli.command, cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "fatal");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, cfg: config::AppConfig) -> anyhow::Result<()> {
    let rt = DigestRuntime::from_config(cfg).context("building runtime")?;
    match command {
        Command::Daily {
            date,
            from_date,
            to_date,
        } => {
            let params = RunParams {
                date,
                from_date,
                to_date,
            };
            let summary = rt.run_daily(&params).await?;
            tracing::info!("{}", summary.message());
        }
        Command::Weekly => {
            let outcomes = rt.run_weekly().await?;
            for (sheet, outcome) in &outcomes {
                tracing::info!(sheet = %sheet, ?outcome, "weekly outcome");
            }
            if outcomes
                .iter()
                .all(|(_, o)| matches!(o, SheetOutcome::Failed(_)))
                && !outcomes.is_empty()
            {
                anyhow::bail!("weekly reset failed for every sheet");
            }
        }
        Command::Schedule => {
            let schedule = rt.schedule()?;
            let rt = Arc::new(rt);
            let handle = scheduler::spawn(schedule, move |job| {
                let rt = Arc::clone(&rt);
                async move {
                    match job {
                        Job::Daily => rt.run_daily(&RunParams::default()).await.map(|_| ()),
                        Job::Weekly => rt.run_weekly().await.map(|_| ()),
                    }
                }
            });
            tokio::select! {
                res = handle => res.context("scheduler task")?,
                _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
            }
        }
    }
    Ok(())
}
