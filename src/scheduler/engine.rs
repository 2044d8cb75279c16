use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::error::{Result, SchedulerError};
use super::job::{JobBody, JobStatus, RecurringJob};

/// How long [`Scheduler::shutdown`] waits for in-flight runs.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// In-process cron scheduler. Each registered job gets its own background task,
/// independent of request handling.
pub struct Scheduler {
    timezone: Tz,
    jobs: Vec<Arc<RecurringJob>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
}

impl Scheduler {
    pub fn new(timezone: Tz) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            timezone,
            jobs: Vec::new(),
            shutdown_tx,
            tasks: Vec::new(),
            started: false,
        }
    }

    /// Register a job under a unique id, evaluated in the scheduler's timezone.
    pub fn add_job(
        &mut self,
        job_id: &str,
        cron_expression: &str,
        body: Arc<dyn JobBody>,
    ) -> Result<Arc<RecurringJob>> {
        if self.jobs.iter().any(|job| job.id() == job_id) {
            return Err(SchedulerError::DuplicateJob(job_id.to_string()));
        }

        let job = Arc::new(RecurringJob::new(job_id, cron_expression, self.timezone, body)?);
        if self.started {
            self.tasks.push(self.spawn_loop(Arc::clone(&job)));
        }
        self.jobs.push(Arc::clone(&job));
        info!(%job_id, %cron_expression, timezone = %self.timezone, "Job registered");
        Ok(job)
    }

    /// Spawn one trigger loop per registered job.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.started = true;
        self.tasks = self.jobs.iter().map(|job| self.spawn_loop(Arc::clone(job))).collect();
        info!(jobs = self.jobs.len(), "Scheduler started");
        Ok(())
    }

    pub fn jobs(&self) -> Vec<JobStatus> {
        self.jobs.iter().map(|job| job.status()).collect()
    }

    /// Signal every loop to stop and wait up to [`SHUTDOWN_GRACE`] for in-flight
    /// invocations to finish.
    pub async fn shutdown(self) {
        self.shutdown_within(SHUTDOWN_GRACE).await;
    }

    /// Like [`Scheduler::shutdown`] with an explicit grace period. Loops still
    /// running when it elapses are aborted.
    pub async fn shutdown_within(self, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        let deadline = Instant::now() + grace;

        for mut task in self.tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                warn!(?grace, "Job still running at shutdown; aborting it");
                task.abort();
            }
        }
        info!("Scheduler stopped");
    }

    fn spawn_loop(&self, job: Arc<RecurringJob>) -> JoinHandle<()> {
        tokio::spawn(run_job_loop(job, self.shutdown_tx.subscribe()))
    }
}

async fn run_job_loop(job: Arc<RecurringJob>, mut shutdown: watch::Receiver<bool>) {
    // Guards against firing the same slot twice if the wall clock lags the timer
    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        let from = last_fired.map_or(now, |fired| fired.max(now));
        let Some(next) = job.next_fire_after(from) else {
            warn!(job_id = %job.id(), "No upcoming trigger; job loop exiting");
            return;
        };
        let next = next.with_timezone(&Utc);
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                last_fired = Some(next);
                job.fire().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
