use thiserror::Error;

/// Failures while registering or starting scheduled jobs
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{expression}' for job '{job_id}': {reason}")]
    InvalidCron {
        job_id: String,
        expression: String,
        reason: String,
    },

    #[error("Job '{0}' is already registered")]
    DuplicateJob(String),

    #[error("Scheduler already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
