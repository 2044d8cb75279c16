use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use tokio::sync::Mutex;

use super::engine::Scheduler;
use super::error::{Result, SchedulerError};
use super::gate::JobRegistrar;
use super::job::{JobBody, JobStatus};

struct JobDefinition {
    job_id: String,
    cron_expression: String,
    body: Arc<dyn JobBody>,
}

/// Holds job definitions until leadership is confirmed, then builds and starts
/// the scheduler. Nothing is registered in a process that never calls `start`.
pub struct CronRegistrar {
    timezone: Tz,
    definitions: Vec<JobDefinition>,
    scheduler: Mutex<Option<Scheduler>>,
}

impl CronRegistrar {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            definitions: Vec::new(),
            scheduler: Mutex::new(None),
        }
    }

    pub fn with_job(mut self, job_id: impl Into<String>, cron_expression: impl Into<String>, body: Arc<dyn JobBody>) -> Self {
        self.definitions.push(JobDefinition {
            job_id: job_id.into(),
            cron_expression: cron_expression.into(),
            body,
        });
        self
    }

    /// Registered jobs; empty unless this process started the scheduler.
    pub async fn jobs(&self) -> Vec<JobStatus> {
        match self.scheduler.lock().await.as_ref() {
            Some(scheduler) => scheduler.jobs(),
            None => Vec::new(),
        }
    }

    pub async fn shutdown(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.shutdown().await;
        }
    }
}

#[async_trait]
impl JobRegistrar for CronRegistrar {
    async fn start(&self) -> Result<()> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }

        // Register everything before starting so a bad definition starts nothing
        let mut scheduler = Scheduler::new(self.timezone);
        for definition in &self.definitions {
            scheduler.add_job(&definition.job_id, &definition.cron_expression, Arc::clone(&definition.body))?;
        }
        scheduler.start()?;

        *slot = Some(scheduler);
        Ok(())
    }
}
