// handlers/protected/scheduler.rs - GET /v1/service/scheduler (SYS_ADMIN)

use axum::{extract::State, Extension};
use serde::Serialize;

use crate::app::AppState;
use crate::auth::{AuthError, Authority};
use crate::middleware::{ApiResponse, AuthUser};
use crate::scheduler::{GateState, JobStatus};

#[derive(Debug, Serialize)]
pub struct SchedulerStatus {
    pub state: GateState,
    pub lock_key: String,
    pub jobs: Vec<JobStatus>,
}

/// Whether this instance won the scheduler lease, and what it runs.
/// An `idle` state on every instance means no replica is scheduling.
pub async fn scheduler_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<SchedulerStatus>, AuthError> {
    user.require(&[Authority::SysAdmin])?;

    Ok(ApiResponse::success(SchedulerStatus {
        state: state.gate.state(),
        lock_key: state.config.scheduler.lock_key.clone(),
        jobs: state.registrar.jobs().await,
    }))
}
