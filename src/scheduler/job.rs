use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{error, info};

use super::error::{Result, SchedulerError};

/// Body of a scheduled job. Takes no input; an `Err` is logged by the scheduler.
#[async_trait]
pub trait JobBody: Send + Sync + 'static {
    async fn run(&self) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`JobBody`].
pub struct FnJob<F>(pub F);

#[async_trait]
impl<F, Fut> JobBody for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

/// Registration record of a recurring job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSchedule {
    pub job_id: String,
    pub cron_expression: String,
    pub timezone: String,
}

/// Result of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
    Panicked,
}

/// Point-in-time view of a job for operators.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    #[serde(flatten)]
    pub schedule: JobSchedule,
    pub next_run: Option<String>,
    pub runs: u64,
    pub failures: u64,
}

pub struct RecurringJob {
    schedule: JobSchedule,
    cron: cron::Schedule,
    timezone: Tz,
    body: Arc<dyn JobBody>,
    runs: AtomicU64,
    failures: AtomicU64,
}

impl RecurringJob {
    /// Build a job from a 6- or 7-field cron expression (seconds first).
    pub fn new(
        job_id: impl Into<String>,
        cron_expression: &str,
        timezone: Tz,
        body: Arc<dyn JobBody>,
    ) -> Result<Self> {
        let job_id = job_id.into();
        let cron = cron::Schedule::from_str(cron_expression).map_err(|e| SchedulerError::InvalidCron {
            job_id: job_id.clone(),
            expression: cron_expression.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            schedule: JobSchedule {
                job_id,
                cron_expression: cron_expression.to_string(),
                timezone: timezone.name().to_string(),
            },
            cron,
            timezone,
            body,
            runs: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.schedule.job_id
    }

    /// Next trigger strictly after `after`, evaluated in the job's timezone.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Tz>> {
        self.cron.after(&after.with_timezone(&self.timezone)).next()
    }

    /// Run the body once on its own task. Errors and panics are logged and
    /// reported as the outcome, never propagated.
    pub async fn fire(&self) -> JobOutcome {
        let job_id = self.id().to_string();
        let body = Arc::clone(&self.body);
        let started = Instant::now();
        self.runs.fetch_add(1, Ordering::Relaxed);

        let outcome = match tokio::spawn(async move { body.run().await }).await {
            Ok(Ok(())) => {
                info!(%job_id, elapsed_ms = started.elapsed().as_millis() as u64, "Job completed");
                JobOutcome::Succeeded
            }
            Ok(Err(e)) => {
                error!(%job_id, error = %format!("{e:#}"), "Job execution failed");
                JobOutcome::Failed
            }
            Err(join_err) if join_err.is_panic() => {
                error!(%job_id, "Job panicked");
                JobOutcome::Panicked
            }
            Err(join_err) => {
                error!(%job_id, error = %join_err, "Job task cancelled");
                JobOutcome::Failed
            }
        };

        if outcome != JobOutcome::Succeeded {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            schedule: self.schedule.clone(),
            next_run: self.next_fire_after(Utc::now()).map(|t| t.to_rfc3339()),
            runs: self.runs.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RecurringJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurringJob").field("schedule", &self.schedule).finish()
    }
}
