//! Leader-gated background scheduling.
//!
//! Startup flow: [`SchedulerGate::maybe_start`] takes the boot-time lease through
//! [`crate::lock::DistributedLock`]; only the winner's [`JobRegistrar`] builds a
//! [`Scheduler`] and starts its [`RecurringJob`] loops. Losers never register a job.

pub mod engine;
pub mod error;
pub mod gate;
pub mod job;
pub mod registrar;

pub use engine::Scheduler;
pub use error::SchedulerError;
pub use gate::{GateState, JobRegistrar, SchedulerGate};
pub use job::{FnJob, JobBody, JobOutcome, JobSchedule, JobStatus, RecurringJob};
pub use registrar::CronRegistrar;
