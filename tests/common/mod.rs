#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono_tz::Tz;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use ems_enterprise_ai::app::{app, AppState};
use ems_enterprise_ai::auth::{issue_access_token, Authority, TokenSubject};
use ems_enterprise_ai::config::AppConfig;
use ems_enterprise_ai::database::DatabaseManager;
use ems_enterprise_ai::lock::{DistributedLock, KeyValueStore, MemoryStore, StoreError};
use ems_enterprise_ai::scheduler::{CronRegistrar, SchedulerGate};

/// Development config pointing Postgres at a port nothing listens on, so
/// database calls fail fast instead of hanging.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.port = 1;
    config.database.min_connections = 0;
    config.database.connection_timeout_secs = 1;
    config
}

/// A lock store that is always unreachable.
pub struct DownStore;

#[async_trait]
impl KeyValueStore for DownStore {
    async fn set_nx_ex(&self, _key: &str, _value: &str, _expiry: Duration) -> Result<bool, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }
}

pub fn gate_over(store: Arc<dyn KeyValueStore>) -> SchedulerGate {
    SchedulerGate::new(DistributedLock::new(store), "apscheduler", Duration::from_secs(1))
}

/// In-process application state backed by a memory lock store.
pub fn test_state() -> AppState {
    let config = test_config();
    AppState {
        database: DatabaseManager::connect_lazy(&config.database),
        gate: Arc::new(gate_over(Arc::new(MemoryStore::new()))),
        registrar: Arc::new(CronRegistrar::new(Tz::Asia__Taipei)),
        config: Arc::new(config),
    }
}

pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    (app(state.clone()), state)
}

pub fn token_for(state: &AppState, authority: Authority) -> String {
    let subject = TokenSubject {
        email_address: "user@group.com".to_string(),
        account: "user".to_string(),
        user_id: Uuid::new_v4(),
        authority,
    };
    issue_access_token(&subject, None, &state.config.security).expect("token")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub challenge: Option<String>,
    pub body: Value,
}

/// Send one request through the router without binding a socket.
pub async fn send(router: Router, method: &str, uri: &str, token: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = router
        .oneshot(builder.body(Body::empty()).expect("request"))
        .await
        .expect("router is infallible");

    let status = response.status();
    let challenge = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse { status, challenge, body }
}
