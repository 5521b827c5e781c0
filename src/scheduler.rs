//! Job scheduler: the fixed job table on independent per-job timers,
//! driven by one coordinator loop.
//!
//! Each due firing runs as its own task and reports back over a completion
//! channel; a job that is still running is skipped when its timer comes
//! due again, and a failure (error, timeout, panic) is absorbed at the job
//! boundary without touching any other job.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::analyzer::Analyzer;
use crate::config::AppConfig;
use crate::error::FetchError;
use crate::instrument::Instrument;
use crate::prices::PriceBook;
use crate::sources::{NewsFeed, NewsSource, PriceSource};

/// One-time metrics registration (so series show up with descriptions).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scheduler_job_runs_total", "Job firings, per job.");
        describe_counter!("scheduler_job_failures_total", "Failed job firings, per job.");
        describe_gauge!("scheduler_last_tick_ts", "Unix ts of the scheduler's last tick.");
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    RefreshCalendar,
    RefreshNews,
    RefreshInstrumentNews(Instrument),
    RefreshPrices,
}

#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub kind: JobKind,
    pub interval: Duration,
}

/// Build the static job table from configuration.
pub fn job_table(cfg: &AppConfig) -> Vec<JobSpec> {
    let mut jobs = vec![
        JobSpec {
            name: "refresh_calendar".into(),
            kind: JobKind::RefreshCalendar,
            interval: Duration::from_secs(cfg.jobs.calendar_secs),
        },
        JobSpec {
            name: "refresh_news".into(),
            kind: JobKind::RefreshNews,
            interval: Duration::from_secs(cfg.jobs.news_secs),
        },
    ];
    for instrument in &cfg.instruments {
        jobs.push(JobSpec {
            name: format!(
                "refresh_market_news_{}",
                instrument.symbol().to_ascii_lowercase()
            ),
            kind: JobKind::RefreshInstrumentNews(*instrument),
            interval: Duration::from_secs(cfg.jobs.instrument_news_secs),
        });
    }
    jobs.push(JobSpec {
        name: "refresh_prices".into(),
        kind: JobKind::RefreshPrices,
        interval: Duration::from_secs(cfg.jobs.prices_secs),
    });
    jobs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobOutcome {
    Ok,
    Failed,
}

/// Pure per-job timer: fires once `interval` has elapsed since arming (or
/// since the previous firing), never earlier. Interval is measured
/// start-to-start.
#[derive(Debug, Clone)]
pub struct JobTimer {
    interval_secs: u64,
    armed_at: u64,
    last_fired: Option<u64>,
}

impl JobTimer {
    pub fn new(interval: Duration, now_secs: u64) -> Self {
        Self {
            interval_secs: interval.as_secs().max(1),
            armed_at: now_secs,
            last_fired: None,
        }
    }

    pub fn due(&self, now_secs: u64) -> bool {
        let base = self.last_fired.unwrap_or(self.armed_at);
        now_secs.saturating_sub(base) >= self.interval_secs
    }

    pub fn mark_fired(&mut self, now_secs: u64) {
        self.last_fired = Some(now_secs);
    }
}

/// Operational snapshot of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub interval_secs: u64,
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: Option<JobOutcome>,
}

#[derive(Debug)]
struct JobRuntime {
    spec: JobSpec,
    timer: JobTimer,
    running: bool,
    last_run_at: Option<DateTime<Utc>>,
    last_status: Option<JobOutcome>,
}

/// Everything a firing needs, shared by Arc into the job tasks.
struct JobCtx {
    analyzer: Arc<Analyzer>,
    news: Arc<dyn NewsSource>,
    prices: Arc<dyn PriceSource>,
    price_book: Arc<PriceBook>,
    instruments: Vec<Instrument>,
    fetch_timeout: Duration,
}

/// Cloneable handle to the scheduler's live status board.
#[derive(Clone)]
pub struct SchedulerStatus(Arc<Mutex<Vec<JobStatus>>>);

impl SchedulerStatus {
    pub fn snapshot(&self) -> Vec<JobStatus> {
        self.0.lock().expect("status mutex poisoned").clone()
    }
}

pub struct Scheduler {
    ctx: Arc<JobCtx>,
    jobs: Vec<JobRuntime>,
    tick: Duration,
    grace: Duration,
    data_dir: PathBuf,
    refresh_log: HashMap<String, DateTime<Utc>>,
    status: Arc<Mutex<Vec<JobStatus>>>,
}

impl Scheduler {
    pub fn new(
        cfg: &AppConfig,
        analyzer: Arc<Analyzer>,
        news: Arc<dyn NewsSource>,
        prices: Arc<dyn PriceSource>,
        price_book: Arc<PriceBook>,
    ) -> Self {
        let now = unix_now();
        let jobs = job_table(cfg)
            .into_iter()
            .map(|spec| JobRuntime {
                timer: JobTimer::new(spec.interval, now),
                spec,
                running: false,
                last_run_at: None,
                last_status: None,
            })
            .collect();

        Self {
            ctx: Arc::new(JobCtx {
                analyzer,
                news,
                prices,
                price_book,
                instruments: cfg.instruments.clone(),
                fetch_timeout: cfg.fetch_timeout(),
            }),
            jobs,
            tick: Duration::from_secs(1),
            grace: cfg.shutdown_grace(),
            data_dir: cfg.data_dir.clone(),
            refresh_log: HashMap::new(),
            status: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Coarser or finer coordinator tick (tests use a few milliseconds).
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn status_handle(&self) -> SchedulerStatus {
        SchedulerStatus(Arc::clone(&self.status))
    }

    /// Drive the job table until `shutdown` flips to true, then wait out
    /// in-flight firings up to the grace period.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        ensure_metrics_described();
        info!(jobs = self.jobs.len(), "scheduler started");

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(usize, JobOutcome)>();
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = unix_now();
                    gauge!("scheduler_last_tick_ts").set(now as f64);
                    for idx in 0..self.jobs.len() {
                        if self.jobs[idx].running || !self.jobs[idx].timer.due(now) {
                            continue;
                        }
                        self.spawn_firing(idx, now, &done_tx);
                    }
                }
                Some((idx, outcome)) = done_rx.recv() => {
                    self.complete_firing(idx, outcome);
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
            self.publish_status();
        }

        self.drain(&mut done_rx).await;
        self.publish_status();
        info!("scheduler stopped");
        Ok(())
    }

    fn spawn_firing(&mut self, idx: usize, now: u64, done_tx: &mpsc::UnboundedSender<(usize, JobOutcome)>) {
        let job = &mut self.jobs[idx];
        job.timer.mark_fired(now);
        job.running = true;
        job.last_run_at = Some(Utc::now());

        let name = job.spec.name.clone();
        let kind = job.spec.kind.clone();
        let ctx = Arc::clone(&self.ctx);
        let tx = done_tx.clone();

        counter!("scheduler_job_runs_total", "job" => name.clone()).increment(1);
        info!(job = %name, "job firing");

        let work = tokio::spawn(async move { execute(&ctx, &kind).await });
        tokio::spawn(async move {
            let outcome = match work.await {
                Ok(Ok(detail)) => {
                    info!(job = %name, %detail, "job ok");
                    JobOutcome::Ok
                }
                Ok(Err(e)) => {
                    warn!(job = %name, error = %e, "job failed, will retry on next firing");
                    JobOutcome::Failed
                }
                Err(join_err) => {
                    error!(job = %name, error = %join_err, "job task died");
                    JobOutcome::Failed
                }
            };
            let _ = tx.send((idx, outcome));
        });
    }

    fn complete_firing(&mut self, idx: usize, outcome: JobOutcome) {
        let job = &mut self.jobs[idx];
        job.running = false;
        job.last_status = Some(outcome);
        let name = job.spec.name.clone();
        match outcome {
            JobOutcome::Ok => {
                self.refresh_log.insert(name, Utc::now());
                self.write_refresh_log();
            }
            JobOutcome::Failed => {
                counter!("scheduler_job_failures_total", "job" => name).increment(1);
            }
        }
    }

    /// Best-effort `refresh_log.json` with last success times, next to the
    /// data streams. Failing to write it is only worth a warning.
    fn write_refresh_log(&self) {
        let path = self.data_dir.join("refresh_log.json");
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&self.data_dir)?;
            let body = serde_json::to_vec_pretty(&self.refresh_log)?;
            std::fs::write(&path, body)
        };
        if let Err(e) = write() {
            warn!(path = %path.display(), error = %e, "could not write refresh log");
        }
    }

    fn publish_status(&self) {
        let snapshot: Vec<JobStatus> = self
            .jobs
            .iter()
            .map(|j| JobStatus {
                name: j.spec.name.clone(),
                interval_secs: j.spec.interval.as_secs(),
                running: j.running,
                last_run_at: j.last_run_at,
                last_status: j.last_status,
            })
            .collect();
        *self.status.lock().expect("status mutex poisoned") = snapshot;
    }

    async fn drain(&mut self, done_rx: &mut mpsc::UnboundedReceiver<(usize, JobOutcome)>) {
        while self.jobs.iter().any(|j| j.running) {
            match tokio::time::timeout(self.grace, done_rx.recv()).await {
                Ok(Some((idx, outcome))) => self.complete_firing(idx, outcome),
                _ => {
                    warn!("gave up waiting for in-flight jobs");
                    break;
                }
            }
        }
    }
}

/// Run one firing: fetch (time-bounded), then push articles through the
/// analysis pipeline or prices into the book. Returns a short human
/// summary for the activity log.
async fn execute(ctx: &JobCtx, kind: &JobKind) -> Result<String, FetchError> {
    match kind {
        JobKind::RefreshPrices => {
            let snaps = tokio::time::timeout(
                ctx.fetch_timeout,
                ctx.prices.fetch_snapshots(&ctx.instruments),
            )
            .await
            .map_err(|_| FetchError::Timeout(ctx.fetch_timeout))??;
            let n = snaps.len();
            ctx.price_book.update_all(snaps);
            Ok(format!("{n} price snapshots"))
        }
        _ => {
            let feed = match kind {
                JobKind::RefreshCalendar => NewsFeed::EconomicCalendar,
                JobKind::RefreshInstrumentNews(i) => NewsFeed::InstrumentNews(*i),
                _ => NewsFeed::GeneralNews,
            };
            let articles =
                tokio::time::timeout(ctx.fetch_timeout, ctx.news.fetch_latest(feed))
                    .await
                    .map_err(|_| FetchError::Timeout(ctx.fetch_timeout))??;
            let summary = ctx.analyzer.ingest(&articles);
            Ok(format!(
                "{} articles, {} persisted, {} append failures",
                summary.analyzed, summary.persisted, summary.append_failures
            ))
        }
    }
}

fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_fires_exactly_on_the_interval_grid() {
        // 5-minute job simulated over 17 minutes of instantaneous runs
        let mut timer = JobTimer::new(Duration::from_secs(300), 0);
        let mut fired = Vec::new();
        for now in 0..=1020u64 {
            if timer.due(now) {
                timer.mark_fired(now);
                fired.push(now);
            }
        }
        assert_eq!(fired, vec![300, 600, 900]);
    }

    #[test]
    fn timer_never_fires_before_the_interval_elapsed() {
        let timer = JobTimer::new(Duration::from_secs(60), 1000);
        for now in 1000..1060u64 {
            assert!(!timer.due(now), "fired early at {now}");
        }
        assert!(timer.due(1060));
    }

    #[test]
    fn timer_measures_from_the_last_firing() {
        let mut timer = JobTimer::new(Duration::from_secs(60), 0);
        timer.mark_fired(75); // late firing shifts the grid
        assert!(!timer.due(120));
        assert!(timer.due(135));
    }

    #[test]
    fn job_table_covers_the_configured_instruments() {
        let cfg = AppConfig::default();
        let jobs = job_table(&cfg);
        // calendar + news + prices + one per instrument
        assert_eq!(jobs.len(), 3 + cfg.instruments.len());
        assert!(jobs.iter().any(|j| j.name == "refresh_calendar"
            && j.interval == Duration::from_secs(1800)));
        assert!(jobs
            .iter()
            .any(|j| j.name == "refresh_market_news_goldusd"
                && j.kind == JobKind::RefreshInstrumentNews(Instrument::GoldUsd)));
        assert!(jobs.iter().any(|j| j.name == "refresh_prices"));
    }
}
