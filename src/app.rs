use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::scheduler::{CronRegistrar, SchedulerGate};

/// Everything handlers need, built once by the composition root
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: DatabaseManager,
    pub gate: Arc<SchedulerGate>,
    pub registrar: Arc<CronRegistrar>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/v1/service/health_check", get(public::health_check))
        // Protected (JWT)
        .merge(protected_routes(state.clone()))
        .fallback(not_found)
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/auth/logout", post(protected::logout))
        .route("/v1/service/scheduler", get(protected::scheduler_status))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
