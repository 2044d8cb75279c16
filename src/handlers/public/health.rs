// handlers/public/health.rs - GET /v1/service/health_check

use axum::extract::State;
use serde::Serialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub version: &'static str,
    pub msg: &'static str,
    pub error: &'static str,
}

/// Reports the service version once the database answers; 500 otherwise.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<HealthCheck> {
    state.database.health_check().await?;

    Ok(ApiResponse::success(HealthCheck {
        version: env!("CARGO_PKG_VERSION"),
        msg: "Service Up",
        error: "",
    }))
}
