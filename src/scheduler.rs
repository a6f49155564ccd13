// src/scheduler.rs
//! Long-running mode: fire the daily job every day and the weekly job once a
//! week, at fixed local wall-clock times.

use std::future::Future;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Weekday};
use tokio::task::JoinHandle;

use crate::localtime::{at_local, now_local, to_local};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleCfg {
    pub daily_at: NaiveTime,
    pub weekly_on: Weekday,
    pub weekly_at: NaiveTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Job {
    Daily,
    Weekly,
}

/// First local `at` strictly after `now`.
pub fn next_daily(now: DateTime<FixedOffset>, at: NaiveTime) -> DateTime<FixedOffset> {
    let local = to_local(now);
    let candidate = at_local(local.date_naive().and_time(at));
    if candidate > local {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// First `weekday` at local `at` strictly after `now`.
pub fn next_weekly(
    now: DateTime<FixedOffset>,
    weekday: Weekday,
    at: NaiveTime,
) -> DateTime<FixedOffset> {
    let local = to_local(now);
    let ahead = (7 + i64::from(weekday.num_days_from_monday())
        - i64::from(local.weekday().num_days_from_monday()))
        % 7;
    let candidate = at_local((local.date_naive() + Duration::days(ahead)).and_time(at));
    if candidate > local {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}

/// Jobs due at the earliest upcoming fire time, plus that time.
pub fn next_due(now: DateTime<FixedOffset>, cfg: &ScheduleCfg) -> (DateTime<FixedOffset>, Vec<Job>) {
    let d = next_daily(now, cfg.daily_at);
    let w = next_weekly(now, cfg.weekly_on, cfg.weekly_at);
    if w < d {
        (w, vec![Job::Weekly])
    } else if d < w {
        (d, vec![Job::Daily])
    } else {
        // Same instant: archive before ingest.
        (d, vec![Job::Weekly, Job::Daily])
    }
}

/// Spawn the scheduler loop. `run_job` is awaited for every due job; its
/// errors are logged and the loop keeps going.
pub fn spawn<F, Fut>(cfg: ScheduleCfg, mut run_job: F) -> JoinHandle<()>
where
    F: FnMut(Job) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let now = now_local();
            let (at, jobs) = next_due(now, &cfg);
            let wait = (at - now).to_std().unwrap_or_default();
            tracing::info!(target: "scheduler", next = %at.format("%Y-%m-%d %H:%M"), ?jobs, "sleeping until next job");
            tokio::time::sleep(wait).await;

            for job in jobs {
                tracing::info!(target: "scheduler", ?job, "job starting");
                if let Err(e) = run_job(job).await {
                    tracing::error!(target: "scheduler", ?job, error = ?e, "job failed");
                }
            }
        }
    })
}
