use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use super::error::SchedulerError;
use crate::lock::{DistributedLock, LockError};

/// Leadership state of this process. `Running` and `Idle` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Unstarted,
    Running,
    Idle,
}

/// Registers the recurring jobs and starts the in-process scheduler.
#[async_trait]
pub trait JobRegistrar: Send + Sync {
    async fn start(&self) -> Result<(), SchedulerError>;
}

/// Starts the scheduler only in the process that wins the boot-time lease.
pub struct SchedulerGate {
    lock: DistributedLock,
    key: String,
    ttl: Duration,
    // Serialises start attempts; held across the lease round-trip
    attempt: Mutex<()>,
    state: watch::Sender<GateState>,
}

impl SchedulerGate {
    pub fn new(lock: DistributedLock, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            lock,
            key: key.into(),
            ttl,
            attempt: Mutex::new(()),
            state: watch::channel(GateState::Unstarted).0,
        }
    }

    /// Last published state. Never waits on an attempt in progress, which
    /// reads as `Unstarted` until it settles.
    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// Try to take the lease once; start `registrar` only if it was won.
    ///
    /// Attempts are serialised, so concurrent or repeated calls observe the
    /// first call's result and never reach the registrar again.
    pub async fn maybe_start(&self, registrar: &dyn JobRegistrar) -> GateState {
        let _attempt = self.attempt.lock().await;
        let current = self.state();
        if current != GateState::Unstarted {
            warn!(state = ?current, "Scheduler gate already decided; ignoring repeated start");
            return current;
        }

        let decided = match self.lock.try_acquire(&self.key, self.ttl).await {
            Ok(Some(lease)) => match registrar.start().await {
                Ok(()) => {
                    info!(key = %lease.key, owner = %lease.owner_token, "Won scheduler lease; scheduler running");
                    GateState::Running
                }
                Err(e) => {
                    error!(key = %self.key, error = %e, "Won scheduler lease but job registration failed");
                    GateState::Idle
                }
            },
            Ok(None) => {
                info!(key = %self.key, "Scheduler lease held elsewhere; running without scheduler");
                GateState::Idle
            }
            Err(LockError::InvalidTtl(ttl)) => {
                error!(key = %self.key, ?ttl, "Scheduler lease TTL invalid; running without scheduler");
                GateState::Idle
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Could not confirm scheduler leadership; running without scheduler");
                GateState::Idle
            }
        };
        self.state.send_replace(decided);
        decided
    }
}
