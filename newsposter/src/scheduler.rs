//! Daily job scheduler.
//!
//! One tokio task per configured job sleeps until the next local wall-clock occurrence of
//! its time, then spawns a pipeline run and goes back to sleep. Runs are detached, so a slow
//! run never delays the next firing and overlapping runs are possible; each run writes its
//! own image file. Failed runs are logged and dropped.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use common::SchedulerConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::pipeline::{Pipeline, PipelineRequest};

/// Time to wait before the next firing of a job scheduled at the given local time.
pub type NextFire = Arc<dyn Fn(NaiveTime) -> Duration + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub id: String,
    pub name: String,
    pub at: NaiveTime,
    pub request: PipelineRequest,
}

impl ScheduledJob {
    /// Trigger description in the `cron[hour='15', minute='0']` form.
    pub fn trigger(&self) -> String {
        format!("cron[hour='{}', minute='{}']", self.at.hour(), self.at.minute())
    }
}

/// Row returned by `GET /jobs/`
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    /// `None` while the scheduler is not running
    pub next_run_time: Option<DateTime<Local>>,
    pub trigger: String,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    jobs: Vec<ScheduledJob>,
    running: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    next_fire: NextFire,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, jobs: Vec<ScheduledJob>) -> Self {
        Self {
            pipeline,
            jobs,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            handles: Mutex::new(Vec::new()),
            next_fire: Arc::new(wait_until_local),
        }
    }

    /// Replace the wall-clock wait between firings.
    pub fn with_next_fire(mut self, next_fire: NextFire) -> Self {
        self.next_fire = next_fire;
        self
    }

    pub fn from_config(pipeline: Arc<Pipeline>, config: &SchedulerConfig) -> Result<Self> {
        let jobs = config
            .jobs
            .iter()
            .map(|job| {
                Ok(ScheduledJob {
                    id: job.id.clone(),
                    name: job.name.clone().unwrap_or_else(|| job.id.clone()),
                    at: common::parse_daily_time(&job.time)?,
                    request: PipelineRequest {
                        category: job.category.clone(),
                        prompt: job.prompt.clone(),
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(pipeline, jobs))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn one task per job. Calling `start` twice is a no-op.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut handles = self.handles.lock().await;
        for job in &self.jobs {
            info!(job = %job.id, trigger = %job.trigger(), "scheduler: job added");
            handles.push(tokio::spawn(run_job(
                job.clone(),
                self.pipeline.clone(),
                self.running.clone(),
                self.shutdown_notify.clone(),
                self.next_fire.clone(),
            )));
        }
        info!("scheduler: started with {} job(s)", self.jobs.len());
    }

    /// Stop the job tasks. Runs already in flight are left to finish on their own.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("scheduler: shutting down");
        self.shutdown_notify.notify_waiters();

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => error!(%join_err, "scheduler: job task panicked"),
                Err(_) => info!("scheduler: timed out waiting for a job task to exit"),
            }
        }
        info!("scheduler: shutdown complete");
    }

    pub fn jobs(&self) -> Vec<JobInfo> {
        let now = Local::now();
        let running = self.is_running();
        self.jobs
            .iter()
            .map(|job| JobInfo {
                id: job.id.clone(),
                name: job.name.clone(),
                next_run_time: running.then(|| next_occurrence(now, job.at)),
                trigger: job.trigger(),
            })
            .collect()
    }
}

async fn run_job(
    job: ScheduledJob,
    pipeline: Arc<Pipeline>,
    running: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
    next_fire: NextFire,
) {
    loop {
        // Register for the wakeup before checking the flag so a shutdown cannot slip in between
        let shutdown = shutdown_notify.notified();
        tokio::pin!(shutdown);
        shutdown.as_mut().enable();
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let wait = next_fire(job.at);
        info!(job = %job.id, wait_secs = wait.as_secs(), "scheduler: waiting for next run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = &mut shutdown => break,
        }

        let job_id = job.id.clone();
        let request = job.request.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            info!(job = %job_id, "scheduler: scheduled run executing");
            match pipeline.run(&request).await {
                Ok(outcome) => info!(
                    job = %job_id,
                    run_id = %outcome.run_id,
                    article = %outcome.article.url,
                    "scheduler: scheduled run published"
                ),
                Err(e) => error!(
                    job = %job_id,
                    stage = e.stage(),
                    error = %e,
                    "scheduler: scheduled run failed"
                ),
            }
        });
    }
    info!(job = %job.id, "scheduler: job task stopped");
}

/// Wall-clock wait until the next local `at`.
///
/// Measured from one second ahead so a wakeup that lands a hair early on the wall clock
/// does not fire the same occurrence twice.
fn wait_until_local(at: NaiveTime) -> Duration {
    let now = Local::now();
    let next = next_occurrence(now + ChronoDuration::seconds(1), at);
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Next instant strictly after `now` whose local time is `at`.
pub fn next_occurrence(now: DateTime<Local>, at: NaiveTime) -> DateTime<Local> {
    let mut candidate = next_run_after(now.naive_local(), at);
    // Skip over local times that do not exist (DST gaps)
    for _ in 0..3 {
        if let Some(dt) = Local.from_local_datetime(&candidate).earliest() {
            return dt;
        }
        candidate += ChronoDuration::hours(1);
    }
    now + ChronoDuration::days(1)
}

/// Pure calendar arithmetic behind [`next_occurrence`].
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}
